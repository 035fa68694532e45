//! End-to-end recovery scenarios over the reassembly path: the shapes the
//! listing endpoints actually emit, fed through the public ingest surface the
//! session observers use.

use modium_bridge::reassembly::{first_non_empty_list, DIRECT_LIST_PATHS, RECORD_LIST_PATHS};
use modium_bridge::Reassembler;
use serde_json::json;

fn ids(records: &[serde_json::Value]) -> Vec<i64> {
    records
        .iter()
        .map(|r| r.get("id").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

/// A paginated listing split across two chunks yields each record exactly
/// once, in first-seen order, with the first occurrence's fields.
#[test]
fn two_chunk_listing_recovers_all_records() {
    let payload = r#"{"code":0,"data":{"records":[{"id":1,"priority":5},{"id":2,"priority":3}]}}"#;
    let (first, second) = payload.split_at(payload.len() / 2);

    let reassembler = Reassembler::new();
    reassembler.ingest(first);
    assert_eq!(reassembler.hits(), 0, "half an envelope must keep waiting");
    reassembler.ingest(second);

    assert_eq!(reassembler.hits(), 1);
    let records = reassembler.records();
    assert_eq!(ids(&records), vec![1, 2]);
    assert_eq!(records[0]["priority"], 5);
    assert_eq!(records[1]["priority"], 3);
}

/// Overlapping answers from the primary and the fallback endpoint merge into
/// one set; the fallback can only add, never overwrite.
#[test]
fn fallback_endpoint_merges_without_overwriting() {
    let reassembler = Reassembler::new();
    reassembler.ingest(
        r#"{"code":0,"data":{"records":[{"id":1,"priority":5},{"id":2,"priority":3}]}}"#,
    );
    reassembler.ingest(
        r#"{"code":0,"data":{"records":[{"id":2,"priority":99},{"id":3,"priority":1}]}}"#,
    );

    let records = reassembler.records();
    assert_eq!(ids(&records), vec![1, 2, 3]);
    assert_eq!(records[1]["priority"], 3, "first-seen fields retained");
}

/// Duplicated fragments — the same chunk observed through both the page-side
/// wrapper and the transport-level body fetch — do not double records.
#[test]
fn duplicated_fragments_deduplicate() {
    let payload = r#"{"code":0,"records":[{"id":10},{"id":11}]}"#;
    let reassembler = Reassembler::new();
    reassembler.ingest(payload);
    reassembler.ingest(payload);

    assert_eq!(reassembler.hits(), 2);
    assert_eq!(ids(&reassembler.records()), vec![10, 11]);
}

/// A noisy stream: junk framing bytes, a truncated envelope, then the rest.
#[test]
fn noisy_truncated_stream_recovers() {
    let reassembler = Reassembler::new();
    reassembler.ingest("\u{0002}\u{0003}");
    reassembler.ingest(r#"{"code":0,"data":{"records":[{"id":7,"name":"over"#);
    assert_eq!(reassembler.hits(), 0);
    reassembler.ingest(r#"lay"}]}}"#);

    assert_eq!(reassembler.hits(), 1);
    let records = reassembler.records();
    assert_eq!(ids(&records), vec![7]);
    assert_eq!(records[0]["name"], "overlay");
}

/// The direct-call reply and the streamed envelope embed their lists at
/// different paths; both tables resolve them.
#[test]
fn path_tables_cover_both_reply_shapes() {
    let direct = json!({"code": 0, "data": {"list": [{"id": 4}]}});
    let streamed = json!({"code": 0, "data": {"records": [{"id": 5}]}});

    assert!(first_non_empty_list(&direct, DIRECT_LIST_PATHS).is_some());
    assert!(first_non_empty_list(&direct, RECORD_LIST_PATHS).is_none());
    assert!(first_non_empty_list(&streamed, RECORD_LIST_PATHS).is_some());
}
