//! Recovery of record payloads from fragmented, truncated or duplicated
//! response bodies.
//!
//! The listing endpoints stream large paginated JSON through a side channel
//! that never touches the callback path, and the fragments arrive with junk
//! control characters and missing closing braces. A strict parser would lose
//! that data, so this one accumulates, scrubs, bounds a candidate envelope
//! and repairs up to three missing braces before giving up until more input
//! arrives. Parse failure is the normal waiting state, not an error.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use modium_devtools::DevtoolsSession;

/// Embedding paths tried in order when locating the record list inside a
/// reassembled envelope; first non-empty wins.
pub const RECORD_LIST_PATHS: &[&[&str]] = &[
    &["data", "records"],
    &["records"],
    &["list"],
    &["items"],
];

/// Embedding paths for the direct-call reply shape, which differs by endpoint.
pub const DIRECT_LIST_PATHS: &[&[&str]] = &[&["data", "list"], &["list"], &["items"]];

/// Field names a record's identity may hide behind.
pub const RECORD_ID_KEYS: &[&str] = &["id", "modId", "mod_id"];

/// Leading key of the envelope this protocol wraps listings in.
const ENVELOPE_MARKER: &str = "{\"code\":";

/// Fragments must carry the record key somewhere before parsing is attempted.
const RECORD_WITNESS: &str = "\"records\"";

/// Bounded brace repair for truncated nested objects.
const MAX_BRACE_REPAIR: usize = 3;

/// Control characters that show up as framing junk in observed traffic.
static CONTROL_JUNK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]+").unwrap());

#[derive(Default)]
struct ReassemblyState {
    buf: String,
    seen: HashSet<String>,
    records: Vec<Value>,
    hits: u64,
}

/// Session-scoped accumulator merging every observed response body into one
/// deduplicated record set.
#[derive(Default)]
pub struct Reassembler {
    state: Mutex<ReassemblyState>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reassembler fed by the session's response-body observer.
    pub fn attach(session: &DevtoolsSession) -> Arc<Self> {
        let reassembler = Arc::new(Self::new());
        let sink = reassembler.clone();
        session.on_response_body(move |body| sink.ingest(body));
        reassembler
    }

    /// Feed one observed fragment.
    pub fn ingest(&self, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() || raw == "null" || raw == "undefined" {
            return;
        }

        let mut state = self.state.lock();
        state.buf.push_str(raw);

        // The whole buffer first, then the lone fragment: a fresh complete
        // envelope must not be held hostage by stale junk in front of it.
        let parsed =
            extract_envelope(&scrub(&state.buf)).or_else(|| extract_envelope(&scrub(raw)));

        if let Some(envelope) = parsed {
            let batch = first_non_empty_list(&envelope, RECORD_LIST_PATHS)
                .cloned()
                .unwrap_or_default();
            let merged = merge_records(&mut state, batch);
            state.buf.clear();
            state.hits += 1;
            debug!("reassembled envelope: {merged} new records, {} total", state.records.len());
        }
    }

    /// Number of successful extractions so far. Callers poll this to detect
    /// new data without re-parsing.
    pub fn hits(&self) -> u64 {
        self.state.lock().hits
    }

    /// The deduplicated record set, in first-seen order.
    pub fn records(&self) -> Vec<Value> {
        self.state.lock().records.clone()
    }

    /// Bytes currently awaiting more fragments.
    pub fn buffered_len(&self) -> usize {
        self.state.lock().buf.len()
    }
}

fn scrub(text: &str) -> Cow<'_, str> {
    CONTROL_JUNK.replace_all(text, "")
}

/// Bound a candidate envelope between the leading marker and the last closing
/// brace, then parse strictly with bounded brace repair.
fn extract_envelope(text: &str) -> Option<Value> {
    if !text.contains(RECORD_WITNESS) {
        return None;
    }
    let start = text.find(ENVELOPE_MARKER)?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &text[start..=end];
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }
    let mut repaired = candidate.to_string();
    for _ in 0..MAX_BRACE_REPAIR {
        repaired.push('}');
        if let Ok(value) = serde_json::from_str(&repaired) {
            return Some(value);
        }
    }
    None
}

/// Merge a batch into the record set: identity by id alias, first occurrence
/// wins, insertion order preserved. Records without any id key are dropped.
fn merge_records(state: &mut ReassemblyState, batch: Vec<Value>) -> usize {
    let mut merged = 0;
    for record in batch {
        let Some(id) = record_id(&record) else {
            continue;
        };
        if state.seen.insert(id) {
            state.records.push(record);
            merged += 1;
        }
    }
    merged
}

/// Canonical identity of a record under any of the accepted id field names.
pub fn record_id(record: &Value) -> Option<String> {
    for key in RECORD_ID_KEYS {
        match record.get(key) {
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            _ => {}
        }
    }
    None
}

/// Walk a dotted path into a JSON value.
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key)?;
    }
    Some(cursor)
}

/// First non-empty array found under any of the given paths.
pub fn first_non_empty_list<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Vec<Value>> {
    paths
        .iter()
        .filter_map(|path| value_at(value, path)?.as_array())
        .find(|list| !list.is_empty())
}
