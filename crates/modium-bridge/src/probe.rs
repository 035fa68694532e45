//! Best-effort UI nudges.
//!
//! Clicking through to the mod library (or reloading outright) makes the app
//! emit the traffic the token capture and the reassembler feed on. None of
//! this is a correctness dependency: every failure is swallowed.

use serde_json::json;
use tracing::debug;

use modium_devtools::DevtoolsSession;

/// Labels of the app's home navigation entry, by locale.
pub const HOME_LABELS: &[&str] = &["首页", "Home"];

/// Labels of the mod library entry, by locale.
pub const LIBRARY_LABELS: &[&str] = &["模组库", "Mod Library", "Library"];

const NUDGE_TEMPLATE: &str = r#"
(async function(){
  var sleep = function(ms){ return new Promise(function(r){ setTimeout(r, ms); }); };
  var click = function(labels){
    var nodes = Array.prototype.slice.call(document.querySelectorAll('a,button,[role],div,span'));
    var hit = nodes.find(function(e){
      var text = e.innerText || e.textContent || '';
      return labels.some(function(t){ return text.indexOf(t) !== -1; });
    });
    if (hit) { hit.click(); return true; }
    return false;
  };
  if (click(__HOME__)) { await sleep(180); click(__LIB__); }
  else if (!click(__LIB__)) { location.reload(); }
  return true;
})()
"#;

/// Render the click script with the label tables baked in.
pub fn nudge_script() -> String {
    NUDGE_TEMPLATE
        .replace("__HOME__", &json!(HOME_LABELS).to_string())
        .replace("__LIB__", &json!(LIBRARY_LABELS).to_string())
}

/// Click home, then the mod library; reload as a last resort. Never fails.
pub async fn nudge_library(session: &DevtoolsSession) {
    if let Err(e) = session.evaluate(&nudge_script()).await {
        debug!("ui nudge skipped: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nudge_script_renders_labels() {
        let script = nudge_script();
        assert!(script.contains("首页"));
        assert!(script.contains("模组库"));
        assert!(script.contains("Mod Library"));
        assert!(!script.contains("__HOME__"));
        assert!(!script.contains("__LIB__"));
    }
}
