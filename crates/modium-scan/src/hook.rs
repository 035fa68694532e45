//! Startup-file patching: drop a logging hook next to each plausible entry
//! point and prepend a `require` for it.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use modium_core::Result;

use crate::walk_files;

/// Filename the hook is written under, next to each patched startup file.
pub const HOOK_FILENAME: &str = "modium_hook.js";

const REQUIRE_LINE: &str = "require('./modium_hook.js');\n";

const STARTUP_CANDIDATES: &[&str] = &["main.js", "background.js", "index.js"];

/// The hook logs backend requests, IPC channel traffic and web requests to
/// `modium_hook.log` in the app's working directory.
pub const HOOK_SOURCE: &str = r#"const fs = require('fs');
const path = require('path');
const electron = require('electron');
const { ipcMain, session, net } = electron;
const LOG = path.join(process.cwd(), 'modium_hook.log');
const log = (...a) => {
  try { fs.appendFileSync(LOG, a.map(x => typeof x === 'string' ? x : JSON.stringify(x)).join(' ') + '\n'); } catch {}
};

try {
  const origRequest = net.request;
  net.request = function(...args) {
    log('[net.request]', args);
    const req = origRequest.apply(net, args);
    req.on('response', (res) => {
      const chunks = [];
      res.on('data', (c) => chunks.push(c));
      res.on('end', () => {
        const body = Buffer.concat(chunks).toString('utf8');
        log('[net.response]', res.statusCode, res.headers, body.slice(0, 2000));
      });
    });
    return req;
  };

  const origOn = ipcMain.on.bind(ipcMain);
  ipcMain.on = (ch, listener) => origOn(ch, (...args) => { log('[ipcMain]', ch); listener(...args); });

  electron.app.on('ready', () => {
    const filter = { urls: ['http://*/*', 'https://*/*'] };
    session.defaultSession.webRequest.onBeforeRequest(filter, (details, cb) => {
      log('[webRequest]', details.method, details.url);
      cb({});
    });
  });
} catch (e) { log('[hook error]', e && e.message); }
"#;

/// Patch every plausible startup file under `unpacked`. Returns the patched
/// paths; already-patched files are left alone.
pub fn inject_hook(unpacked: &Path) -> Result<Vec<PathBuf>> {
    let mut patched = Vec::new();

    for file in walk_files(unpacked, &["js"])? {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !STARTUP_CANDIDATES.contains(&name) {
            continue;
        }

        let source = std::fs::read_to_string(&file)?;
        if source.contains(HOOK_FILENAME) {
            debug!("hook already present in {}", file.display());
            continue;
        }

        let hook_path = file.with_file_name(HOOK_FILENAME);
        if !hook_path.exists() {
            std::fs::write(&hook_path, HOOK_SOURCE)?;
        }

        std::fs::write(&file, format!("{REQUIRE_LINE}{source}"))?;
        info!("injected hook into {}", file.display());
        patched.push(file);
    }

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_hook_patches_startup_files() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("resources/app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("main.js"), "console.log('boot');\n").unwrap();
        std::fs::write(app.join("renderer.js"), "console.log('ui');\n").unwrap();

        let patched = inject_hook(dir.path()).unwrap();
        assert_eq!(patched.len(), 1);

        let main = std::fs::read_to_string(app.join("main.js")).unwrap();
        assert!(main.starts_with("require('./modium_hook.js');"));
        assert!(main.contains("console.log('boot');"));
        assert!(app.join(HOOK_FILENAME).exists());

        // Untouched sibling.
        let renderer = std::fs::read_to_string(app.join("renderer.js")).unwrap();
        assert!(!renderer.contains("modium_hook"));
    }

    #[test]
    fn test_inject_hook_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.js"), "start();\n").unwrap();

        assert_eq!(inject_hook(dir.path()).unwrap().len(), 1);
        assert_eq!(inject_hook(dir.path()).unwrap().len(), 0);

        let patched = std::fs::read_to_string(dir.path().join("index.js")).unwrap();
        assert_eq!(patched.matches(HOOK_FILENAME).count(), 1);
    }
}
