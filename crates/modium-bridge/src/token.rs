//! Invoke-key capture from two independent signal sources.
//!
//! Source 1 is the in-page header hook installed by [`crate::bootstrap`],
//! polled through the debugging link. Source 2 is transport-level header
//! inspection of every request and response the page makes. Observations
//! merge last-write-wins; absence is a normal state, never an error, and the
//! value is never validated here — validity is whether calls using it work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use modium_core::protocol;
use modium_devtools::DevtoolsSession;

use crate::bootstrap;

/// Poll interval while waiting for a token to appear.
const TOKEN_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Holds the single current invoke key for a session.
#[derive(Clone, Default)]
pub struct TokenCapture {
    current: Arc<RwLock<Option<String>>>,
}

impl TokenCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capture wired to the session's transport-level observers.
    pub fn attach(session: &DevtoolsSession) -> Self {
        let capture = Self::new();

        let store = capture.current.clone();
        session.on_outgoing_request(move |req| {
            if let Some(value) = scan_headers(&req.headers) {
                *store.write() = Some(value);
            }
        });

        let store = capture.current.clone();
        session.on_response(move |resp| {
            if let Some(value) = scan_headers(&resp.headers) {
                *store.write() = Some(value);
            }
        });

        capture
    }

    /// Record an observation. Last write wins.
    pub fn observe(&self, value: &str) {
        *self.current.write() = Some(value.to_string());
    }

    /// The most recently observed token, if any.
    pub fn current_token(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Poll both sources until a token appears or the deadline lapses.
    pub async fn await_token(
        &self,
        session: &DevtoolsSession,
        deadline: Duration,
    ) -> Option<String> {
        self.await_token_with(deadline, || bootstrap::page_token(session))
            .await
    }

    /// Deadline-bounded wait with a pluggable page poll (the transport source
    /// feeds the store asynchronously regardless).
    pub async fn await_token_with<F, Fut>(&self, deadline: Duration, page_poll: F) -> Option<String>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Option<String>>,
    {
        let started = Instant::now();
        loop {
            if let Some(token) = self.current_token() {
                return Some(token);
            }
            if let Some(token) = page_poll().await {
                self.observe(&token);
                return Some(token);
            }
            if started.elapsed() >= deadline {
                return None;
            }
            tokio::time::sleep(TOKEN_POLL_INTERVAL).await;
        }
    }
}

/// Case-insensitive scan for the invoke-key header.
fn scan_headers(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(protocol::INVOKE_KEY_HEADER))
        .map(|(_, value)| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let capture = TokenCapture::new();
        assert!(capture.current_token().is_none());
        capture.observe("first");
        capture.observe("second");
        assert_eq!(capture.current_token().unwrap(), "second");
    }

    #[test]
    fn test_scan_headers_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Tauri-Invoke-Key".to_string(), "k-42".to_string());
        assert_eq!(scan_headers(&headers).unwrap(), "k-42");

        let mut lower = HashMap::new();
        lower.insert("tauri-invoke-key".to_string(), "k-43".to_string());
        assert_eq!(scan_headers(&lower).unwrap(), "k-43");

        assert!(scan_headers(&HashMap::new()).is_none());
    }

    #[tokio::test]
    async fn test_await_token_returns_page_capture() {
        let capture = TokenCapture::new();
        let token = capture
            .await_token_with(Duration::from_secs(1), || async { Some("page-key".to_string()) })
            .await;
        assert_eq!(token.unwrap(), "page-key");
        // Merged into the store for later current_token() reads.
        assert_eq!(capture.current_token().unwrap(), "page-key");
    }

    #[tokio::test]
    async fn test_await_token_deadline_elapses() {
        let capture = TokenCapture::new();
        let started = std::time::Instant::now();
        let token = capture
            .await_token_with(Duration::from_millis(200), || async { None })
            .await;
        assert!(token.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_store_beats_page_poll() {
        let capture = TokenCapture::new();
        capture.observe("transport-key");
        let token = capture
            .await_token_with(Duration::from_millis(100), || async {
                Some("page-key".to_string())
            })
            .await;
        assert_eq!(token.unwrap(), "transport-key");
    }
}
