//! Synthetic bridge calls resolved through the app's own callback convention.
//!
//! Every call registers a one-shot callback/error handle pair in the page's
//! global scope — exactly what the app's frontend does — and presents both
//! ids plus the invoke key as request headers on the bridge POST. The handle
//! ids live in an explicit client-side table; a lease deregisters them on
//! every exit path, so repeated calls in one session never leak handles.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use modium_core::{protocol, Error, Result};
use modium_devtools::DevtoolsSession;

use crate::token::TokenCapture;

/// Bound on the apply-changes steps; their callbacks are usually prompt but
/// a hung one must not wedge the whole run.
const APPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry of live one-shot handle ids for the session.
#[derive(Default)]
pub struct HandleTable {
    live: Mutex<HashSet<String>>,
}

impl HandleTable {
    fn register(&self, id: &str) -> Result<()> {
        if !self.live.lock().insert(id.to_string()) {
            return Err(Error::HandleInUse(id.to_string()));
        }
        Ok(())
    }

    fn release(&self, id: &str) {
        self.live.lock().remove(id);
    }

    /// Number of handles currently registered.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }
}

/// A registered callback/error handle pair. Deregisters itself on drop.
pub struct HandleLease {
    table: Arc<HandleTable>,
    pub callback_id: String,
    pub error_id: String,
}

impl HandleLease {
    pub fn acquire(table: Arc<HandleTable>) -> Result<Self> {
        for _ in 0..4 {
            let callback_id = fresh_handle_id();
            let error_id = fresh_handle_id();
            if callback_id == error_id {
                continue;
            }
            if table.register(&callback_id).is_err() {
                continue;
            }
            if table.register(&error_id).is_err() {
                table.release(&callback_id);
                continue;
            }
            return Ok(Self {
                table,
                callback_id,
                error_id,
            });
        }
        Err(Error::HandleInUse("exhausted handle id attempts".to_string()))
    }

    fn window_names(&self) -> (String, String) {
        (format!("_{}", self.callback_id), format!("_{}", self.error_id))
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.table.release(&self.callback_id);
        self.table.release(&self.error_id);
    }
}

/// Numeric-string id in the same shape the app's own frontend generates.
fn fresh_handle_id() -> String {
    (Uuid::new_v4().as_u128() % 1_000_000_000_000_000).to_string()
}

/// Client for the single bridge transport endpoint.
#[derive(Clone)]
pub struct BridgeClient {
    session: DevtoolsSession,
    tokens: TokenCapture,
    handles: Arc<HandleTable>,
}

impl BridgeClient {
    pub fn new(session: DevtoolsSession, tokens: TokenCapture) -> Self {
        Self {
            session,
            tokens,
            handles: Arc::new(HandleTable::default()),
        }
    }

    pub fn session(&self) -> &DevtoolsSession {
        &self.session
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Blocking variant: awaits the callback with no upper bound. Used where
    /// a prompt resolution is expected. Rejection or a transport throw in the
    /// page surfaces as `EvaluationFailed`.
    pub async fn call(&self, endpoint: &str, body: Value) -> Result<Value> {
        let token = self.tokens.current_token().ok_or(Error::NoToken)?;
        let lease = HandleLease::acquire(self.handles.clone())?;
        let expr = call_expr(endpoint, &token, &lease, &body, true)?;

        match self.session.evaluate(&expr).await {
            Ok(value) => Ok(decode_payload(value)),
            Err(e) => {
                self.spawn_cleanup(&lease);
                Err(e)
            }
        }
    }

    /// Raced variant for endpoints known to stream their real answer
    /// out-of-band: a timeout (or any failure) is `None`, never an error.
    /// Returns within `timeout` plus scheduling slack.
    pub async fn call_raced(
        &self,
        endpoint: &str,
        body: Value,
        timeout: Duration,
    ) -> Option<Value> {
        let Some(token) = self.tokens.current_token() else {
            debug!("raced call without token: {endpoint}");
            return None;
        };
        let lease = match HandleLease::acquire(self.handles.clone()) {
            Ok(lease) => lease,
            Err(e) => {
                debug!("handle acquisition failed: {e}");
                return None;
            }
        };
        let expr = match call_expr(endpoint, &token, &lease, &body, true) {
            Ok(expr) => expr,
            Err(e) => {
                debug!("call encoding failed: {e}");
                return None;
            }
        };

        match tokio::time::timeout(timeout, self.session.evaluate(&expr)).await {
            Ok(Ok(value)) => Some(decode_payload(value)),
            Ok(Err(e)) => {
                debug!("bridge call rejected: {endpoint}: {e}");
                self.spawn_cleanup(&lease);
                None
            }
            Err(_) => {
                debug!("bridge call timed out, answer expected out-of-band: {endpoint}");
                self.spawn_cleanup(&lease);
                None
            }
        }
    }

    /// Transmit without awaiting resolution. The page handlers self-delete if
    /// the backend ever invokes them; the client-side lease releases now.
    pub async fn fire(&self, endpoint: &str, body: Value) {
        let Some(token) = self.tokens.current_token() else {
            debug!("fire without token: {endpoint}");
            return;
        };
        let lease = match HandleLease::acquire(self.handles.clone()) {
            Ok(lease) => lease,
            Err(e) => {
                debug!("handle acquisition failed: {e}");
                return;
            }
        };
        let expr = match call_expr(endpoint, &token, &lease, &body, false) {
            Ok(expr) => expr,
            Err(e) => {
                debug!("call encoding failed: {e}");
                return;
            }
        };
        if let Err(e) = self.session.evaluate(&expr).await {
            debug!("fire failed: {endpoint}: {e}");
        }
    }

    /// Toggle a mod's disabled flag.
    pub async fn set_disabled(&self, game_id: u64, mod_id: u64, disabled: bool) -> Result<Value> {
        self.call(
            protocol::EP_SET_DISABLED,
            json!({"gameId": game_id, "modId": mod_id, "disabled": disabled}),
        )
        .await
    }

    /// Rebuild the modded file overlay and resync status. Each step is
    /// best-effort; failures are logged and swallowed.
    pub async fn apply_changes(&self, game_id: u64) {
        for endpoint in [protocol::EP_UPDATE_MODDED_FILES, protocol::EP_SYNC_STATUS] {
            let body = json!({"gameId": game_id});
            if self.call_raced(endpoint, body, APPLY_TIMEOUT).await.is_none() {
                debug!("apply step yielded nothing: {endpoint}");
            }
        }
    }

    /// Best-effort deletion of abandoned window handlers. The delete is a
    /// no-op when the handlers already resolved and removed themselves.
    fn spawn_cleanup(&self, lease: &HandleLease) {
        let (cb, err) = lease.window_names();
        let session = self.session.clone();
        tokio::spawn(async move {
            let expr = format!(
                "(function(){{ delete window[{cb}]; delete window[{err}]; return true; }})()",
                cb = js_string(&cb),
                err = js_string(&err),
            );
            if let Err(e) = session.evaluate(&expr).await {
                debug!("handle cleanup skipped: {e}");
            }
        });
    }
}

const CALL_TEMPLATE: &str = r#"
(async function(){
  var done = new Promise(function(resolve, reject){
    window[__CB__] = function(v){ try { resolve(v); } finally { delete window[__CB__]; delete window[__ERR__]; } };
    window[__ERR__] = function(e){ try { reject(e); } finally { delete window[__CB__]; delete window[__ERR__]; } };
  });
  await fetch(__POST_URL__, {
    method: 'POST',
    headers: __HEADERS__,
    body: JSON.stringify({ msg: __MSG__ })
  });
  __RESOLUTION__
})()
"#;

/// Build the in-page call expression. `await_resolution` selects between the
/// callback-awaiting body and the fire-and-forget one.
fn call_expr(
    endpoint: &str,
    token: &str,
    lease: &HandleLease,
    body: &Value,
    await_resolution: bool,
) -> Result<String> {
    let envelope = json!({
        "endpoint": endpoint,
        "requestId": Uuid::new_v4().to_string(),
        "body": body,
    });
    let msg = serde_json::to_string(&serde_json::to_string(&envelope)?)?;

    let mut headers = serde_json::Map::new();
    headers.insert(
        "content-type".to_string(),
        Value::String("application/json".to_string()),
    );
    headers.insert(
        protocol::INVOKE_KEY_HEADER.to_string(),
        Value::String(token.to_string()),
    );
    headers.insert(
        protocol::CALLBACK_HEADER.to_string(),
        Value::String(lease.callback_id.clone()),
    );
    headers.insert(
        protocol::ERROR_HEADER.to_string(),
        Value::String(lease.error_id.clone()),
    );
    let headers = Value::Object(headers);

    let (cb, err) = lease.window_names();
    let resolution = if await_resolution {
        "return JSON.stringify(await done);"
    } else {
        "done.catch(function(){}); return true;"
    };

    Ok(CALL_TEMPLATE
        .replace("__POST_URL__", &js_string(protocol::IPC_POST_URL))
        .replace("__HEADERS__", &serde_json::to_string(&headers)?)
        .replace("__MSG__", &msg)
        .replace("__CB__", &js_string(&cb))
        .replace("__ERR__", &js_string(&err))
        .replace("__RESOLUTION__", resolution))
}

/// The callback delivers its payload as a JSON string; anything else passes
/// through unchanged.
fn decode_payload(value: Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
