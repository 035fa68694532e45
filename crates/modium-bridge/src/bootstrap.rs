//! The script injected into the target page, and the helpers that talk to it.
//!
//! The page-side half stays minimal: a `Headers` hook that records the newest
//! invoke key into a global, and a `fetch`/XHR wrapper that queues response
//! text for bridge-plugin URLs or record-bearing payloads. Parsing, dedup and
//! buffering all happen client-side in [`crate::reassembly`].

use serde_json::Value;
use tracing::debug;

use modium_core::{protocol, Result};
use modium_devtools::DevtoolsSession;

/// Cap on the page-side chunk queue between drains.
const QUEUE_LIMIT: usize = 64;

const BOOTSTRAP_TEMPLATE: &str = r#"
(function(){
  if (window.__modium_hooked) return true;
  window.__modium_hooked = true;
  window.__modium_q = [];
  (function(){
    var save = function(k, v){
      if (!v) return;
      if (String(k).toLowerCase().indexOf(__KEY_HEADER__) !== -1) { window.__modium_key = v; }
    };
    var ap = Headers.prototype.append, st = Headers.prototype.set;
    Headers.prototype.append = function(k, v){ save(k, v); return ap.call(this, k, v); };
    Headers.prototype.set = function(k, v){ save(k, v); return st.call(this, k, v); };
  })();
  var push = function(url, raw){
    if (!raw || raw === 'null' || raw === 'undefined') return;
    if (String(url || '').indexOf('plugin%3A') === -1 && !/"records"/.test(raw)) return;
    window.__modium_q.push(raw);
    if (window.__modium_q.length > __QUEUE_LIMIT__) { window.__modium_q.shift(); }
  };
  var _f = window.fetch;
  window.fetch = async function(){
    var r = await _f.apply(window, arguments);
    try { var t = await r.clone().text(); push(String(arguments[0] || ''), t); } catch (e) {}
    return r;
  };
  var _o = XMLHttpRequest.prototype.open, _s = XMLHttpRequest.prototype.send;
  XMLHttpRequest.prototype.open = function(m, u){ this.__modium_url = String(u || ''); return _o.apply(this, arguments); };
  XMLHttpRequest.prototype.send = function(){
    this.addEventListener('load', function(){ try { push(this.__modium_url || 'xhr', this.responseText); } catch (e) {} });
    return _s.apply(this, arguments);
  };
  return true;
})()
"#;

/// Render the bootstrap with the protocol's header name baked in.
pub fn bootstrap_script() -> String {
    let key = serde_json::to_string(&protocol::INVOKE_KEY_HEADER.to_lowercase())
        .unwrap_or_else(|_| "\"\"".to_string());
    BOOTSTRAP_TEMPLATE
        .replace("__KEY_HEADER__", &key)
        .replace("__QUEUE_LIMIT__", &QUEUE_LIMIT.to_string())
}

/// Install the page hooks. Idempotent; failure here is fatal for the run.
pub async fn install(session: &DevtoolsSession) -> Result<()> {
    session.evaluate(&bootstrap_script()).await.map(|_| ())
}

/// Fire the harmless plugin call so the app emits a keyed request on its own.
pub async fn poke(session: &DevtoolsSession) {
    let expr = format!(
        "fetch('{}', {{method:'POST', body:'{{}}'}}).then(function(){{return true;}}).catch(function(){{return true;}})",
        protocol::IPC_POKE_URL
    );
    if let Err(e) = session.evaluate(&expr).await {
        debug!("ipc poke skipped: {e}");
    }
}

/// Read the invoke key the page-side header hook has captured, if any.
pub async fn page_token(session: &DevtoolsSession) -> Option<String> {
    match session.evaluate("window.__modium_key || null").await {
        Ok(Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(e) => {
            debug!("page token read failed: {e}");
            None
        }
    }
}

/// Drain the page-side chunk queue. Any failure yields an empty batch.
pub async fn drain_chunks(session: &DevtoolsSession) -> Vec<String> {
    let expr = "JSON.stringify((window.__modium_q || []).splice(0, (window.__modium_q || []).length))";
    let raw = match session.evaluate(expr).await {
        Ok(Value::String(s)) => s,
        Ok(_) => return Vec::new(),
        Err(e) => {
            debug!("chunk drain failed: {e}");
            return Vec::new();
        }
    };
    serde_json::from_str::<Vec<String>>(&raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_renders_placeholders() {
        let script = bootstrap_script();
        assert!(script.contains("\"tauri-invoke-key\""));
        assert!(script.contains("window.__modium_q.length > 64"));
        assert!(!script.contains("__KEY_HEADER__"));
        assert!(!script.contains("__QUEUE_LIMIT__"));
    }
}
