//! String harvesting from native binaries in an unpacked tree.

use std::collections::BTreeSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

use modium_core::Result;

use crate::{relative_to, walk_files};

const BIN_EXTENSIONS: &[&str] = &["exe", "dll", "bin"];

/// Minimum printable run length, matching strings(1) defaults.
const MIN_STRING_LEN: usize = 4;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"']+"#).unwrap());

static ROUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:game|mod|mods|library|plugin)/[A-Za-z0-9_\-/]+").unwrap());

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)Authorization|Bearer|sqlite|sqlcipher|token|manifest|install|uninstall|enable|disable|mount|unmount|priority|order|db",
    )
    .unwrap()
});

/// What the binaries gave up, deduplicated and sorted.
#[derive(Debug, Default, Serialize)]
pub struct NativeReport {
    pub bins: Vec<String>,
    pub urls: Vec<String>,
    #[serde(rename = "probableRoutes")]
    pub probable_routes: Vec<String>,
    pub keywords: Vec<String>,
}

/// Extract printable ASCII runs of at least `min_len` bytes.
pub fn extract_strings(bytes: &[u8], min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if (0x20..0x7f).contains(&b) {
            current.push(b as char);
        } else {
            if current.len() >= min_len {
                out.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= min_len {
        out.push(current);
    }
    out
}

/// Scan the native binaries under an unpacked tree.
pub fn scan_binaries(unpacked: &Path) -> Result<NativeReport> {
    let mut bins = Vec::new();
    let mut urls = BTreeSet::new();
    let mut routes = BTreeSet::new();
    let mut keywords = BTreeSet::new();

    for file in walk_files(unpacked, BIN_EXTENSIONS)? {
        bins.push(relative_to(&file, unpacked));
        let Ok(bytes) = std::fs::read(&file) else {
            continue;
        };
        let text = extract_strings(&bytes, MIN_STRING_LEN).join("\n");
        for m in URL_RE.find_iter(&text) {
            urls.insert(m.as_str().to_string());
        }
        for m in ROUTE_RE.find_iter(&text) {
            routes.insert(m.as_str().to_string());
        }
        for m in KEYWORD_RE.find_iter(&text) {
            keywords.insert(m.as_str().to_string());
        }
    }

    let report = NativeReport {
        bins,
        urls: urls.into_iter().collect(),
        probable_routes: routes.into_iter().collect(),
        keywords: keywords.into_iter().collect(),
    };
    info!(
        "native scan: {} binaries, {} urls, {} routes",
        report.bins.len(),
        report.urls.len(),
        report.probable_routes.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strings() {
        let bytes = b"\x00\x01abc\x02longer-string\xff\x03ok\x00tail";
        let strings = extract_strings(bytes, 4);
        assert_eq!(strings, vec!["longer-string", "tail"]);
    }

    #[test]
    fn test_scan_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let mut blob = vec![0u8; 16];
        blob.extend_from_slice(b"https://update.example.com/manifest");
        blob.push(0);
        blob.extend_from_slice(b"mod/set_disabled");
        blob.push(0xff);
        blob.extend_from_slice(b"sqlite3.dll");
        std::fs::write(dir.path().join("app.exe"), &blob).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"mod/ignored").unwrap();

        let report = scan_binaries(dir.path()).unwrap();
        assert_eq!(report.bins, vec!["app.exe"]);
        assert_eq!(report.urls, vec!["https://update.example.com/manifest"]);
        assert!(report.probable_routes.contains(&"mod/set_disabled".to_string()));
        assert!(report.keywords.iter().any(|k| k.eq_ignore_ascii_case("sqlite")));
    }
}
