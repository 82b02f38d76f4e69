//! Path helpers shared across the pipeline
//!
//! File identities are absolute paths compared by exact string equality, so
//! every path entering the system goes through [`normalize_path`] first
//! (backslashes become forward slashes).

use std::path::Path;

/// Normalize a path string to forward slashes
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Compute `to` relative to the directory `from`, normalized.
///
/// Falls back to the normalized `to` when no relative form exists
/// (different drive prefixes, relative/absolute mix).
pub fn relative_path(from: &str, to: &str) -> String {
    match pathdiff::diff_paths(Path::new(to), Path::new(from)) {
        Some(diff) => normalize_path(&diff.to_string_lossy()),
        None => normalize_path(to),
    }
}

/// Shorten a path for human-facing messages: relative to the current
/// working directory when possible
pub fn humanize_path(path: &str) -> String {
    match std::env::current_dir() {
        Ok(cwd) => relative_path(&cwd.to_string_lossy(), path),
        Err(_) => normalize_path(path),
    }
}

/// The file name without its final extension, e.g. `bundle.js` -> `bundle`
pub fn base_name_without_extension(file: &str) -> String {
    let base = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[..idx].to_string(),
        _ => base,
    }
}
