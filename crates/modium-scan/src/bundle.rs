//! Frontend bundle scan: URLs, auth-storage hints, IPC channel names.

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use modium_core::Result;

use crate::{relative_to, walk_files};

const BUNDLE_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts", "tsx", "jsx", "html"];

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^"')\s]+"#).unwrap());

static AUTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Authorization|Bearer|token|keytar|electron-store|localStorage|setItem\(|getItem\(")
        .unwrap()
});

static IPC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ipc(?:Main|Renderer)\.(?:on|invoke|handle)\(['"]([^'"]+)"#).unwrap());

/// What a bundle scan turned up, deduplicated and sorted.
#[derive(Debug, Default, Serialize)]
pub struct BundleReport {
    pub endpoints: Vec<String>,
    #[serde(rename = "authHints")]
    pub auth_hints: Vec<String>,
    #[serde(rename = "ipcChannels")]
    pub ipc_channels: Vec<String>,
}

/// Scan an unpacked frontend bundle tree.
pub fn scan_bundle(unpacked: &Path) -> Result<BundleReport> {
    let mut endpoints = BTreeSet::new();
    let mut auth_hints = BTreeSet::new();
    let mut ipc_channels = BTreeSet::new();

    for file in walk_files(unpacked, BUNDLE_EXTENSIONS)? {
        let Ok(text) = std::fs::read_to_string(&file) else {
            continue;
        };
        for m in URL_RE.find_iter(&text) {
            endpoints.insert(m.as_str().to_string());
        }
        if AUTH_RE.is_match(&text) {
            auth_hints.insert(relative_to(&file, unpacked));
        }
        for caps in IPC_RE.captures_iter(&text) {
            ipc_channels.insert(caps[1].to_string());
        }
    }

    let report = BundleReport {
        endpoints: endpoints.into_iter().collect(),
        auth_hints: auth_hints.into_iter().collect(),
        ipc_channels: ipc_channels.into_iter().collect(),
    };
    info!(
        "bundle scan: {} endpoints, {} ipc channels, {} auth hints",
        report.endpoints.len(),
        report.ipc_channels.len(),
        report.auth_hints.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_bundle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(
            dir.path().join("assets/app.js"),
            r#"
            fetch("https://api.example.com/v1/mods");
            const ws = "https://cdn.example.com/pkg.zip";
            localStorage.setItem('session', token);
            ipcMain.handle('mod:install', handler);
            ipcRenderer.invoke('game-launch', id);
            "#,
        )
        .unwrap();
        std::fs::write(dir.path().join("readme.txt"), "https://ignored.example.com").unwrap();

        let report = scan_bundle(dir.path()).unwrap();
        assert_eq!(
            report.endpoints,
            vec![
                "https://api.example.com/v1/mods".to_string(),
                "https://cdn.example.com/pkg.zip".to_string(),
            ]
        );
        assert_eq!(report.ipc_channels, vec!["game-launch", "mod:install"]);
        assert_eq!(report.auth_hints, vec!["assets/app.js"]);
    }

    #[test]
    fn test_scan_bundle_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "'https://dup.example.com/x'").unwrap();
        std::fs::write(dir.path().join("b.js"), "'https://dup.example.com/x'").unwrap();

        let report = scan_bundle(dir.path()).unwrap();
        assert_eq!(report.endpoints.len(), 1);
    }

    #[test]
    fn test_scan_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(scan_bundle(&missing).is_err());
    }
}
