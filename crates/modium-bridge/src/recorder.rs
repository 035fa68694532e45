//! Passive capture of the target's non-local network traffic.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use modium_core::{protocol, Result};
use modium_devtools::{DevtoolsSession, RequestMeta, ResponseMeta};

/// One observed request or response.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficEntry {
    pub at: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Collects non-local traffic metadata for later inspection. Purely passive.
#[derive(Clone, Default)]
pub struct TrafficRecorder {
    entries: Arc<Mutex<Vec<TrafficEntry>>>,
}

impl TrafficRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder wired to the session's network observers.
    pub fn attach(session: &DevtoolsSession) -> Self {
        let recorder = Self::new();

        let sink = recorder.clone();
        session.on_outgoing_request(move |req| sink.push_request(req));
        let sink = recorder.clone();
        session.on_response(move |resp| sink.push_response(resp));

        recorder
    }

    pub fn push_request(&self, meta: &RequestMeta) {
        if is_local(&meta.url) {
            return;
        }
        self.entries.lock().push(TrafficEntry {
            at: chrono::Utc::now().to_rfc3339(),
            kind: "request",
            method: Some(meta.method.clone()),
            url: meta.url.clone(),
            status: None,
            mime_type: None,
        });
    }

    pub fn push_response(&self, meta: &ResponseMeta) {
        if is_local(&meta.url) {
            return;
        }
        self.entries.lock().push(TrafficEntry {
            at: chrono::Utc::now().to_rfc3339(),
            kind: "response",
            method: None,
            url: meta.url.clone(),
            status: Some(meta.status),
            mime_type: Some(meta.mime_type.clone()),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<TrafficEntry> {
        self.entries.lock().clone()
    }

    /// Write the capture as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Traffic that belongs to the bridge itself or stays on the machine.
fn is_local(url: &str) -> bool {
    url.contains("ipc.localhost")
        || url.starts_with(protocol::APP_URL_PREFIX)
        || url.contains("://127.0.0.1")
        || url.contains("://localhost")
}
