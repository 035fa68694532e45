//! Modium Scan — offline reconnaissance over an unpacked application tree:
//! URL/IPC-channel harvesting from frontend bundles, string extraction from
//! native binaries, and patching startup files to load a logging hook.

pub mod bundle;
pub mod hook;
pub mod native;

pub use bundle::{scan_bundle, BundleReport};
pub use hook::inject_hook;
pub use native::{scan_binaries, NativeReport};

use std::path::{Path, PathBuf};

/// Recursively collect files under `root` with one of the given extensions.
/// Unreadable subdirectories are skipped; a missing root is an error.
pub(crate) fn walk_files(root: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", root.display()),
        ));
    }

    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.contains(&e))
                .unwrap_or(false)
            {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Path relative to `root`, for report readability.
pub(crate) fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
