//! Resource name normalization and base-directory path resolution
//!
//! Names stored in a package use `\` as the only separator and compare
//! case-insensitively (ASCII). Loose files on disk are resolved against a base
//! directory with `/`, which every supported platform accepts.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Separator used for names stored inside a package
pub const PACKAGE_SEPARATOR: char = '\\';

/// Normalize a resource name for storage or lookup
///
/// Converts `/` to `\`, strips one leading `.\`, then trims trailing and
/// leading spaces.
pub fn normalize_name(name: &str) -> String {
    let converted = name.replace('/', "\\");
    let stripped = converted.strip_prefix(".\\").unwrap_or(&converted);
    stripped.trim_end_matches(' ').trim_start_matches(' ').to_string()
}

/// Truncate a name to at most `max_bytes` bytes without splitting a character
pub fn truncate_name(name: &mut String, max_bytes: usize) {
    if name.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name.truncate(cut);
}

/// ASCII case-insensitive ordering of two names
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

/// ASCII case-insensitive equality of two names
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn to_disk_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `name` (optionally inside `folder`) against `base_dir`
///
/// Absolute names are returned unchanged. A leading `./` or `.\` is dropped.
pub fn full_path(base_dir: &Path, folder: Option<&str>, name: &str) -> PathBuf {
    if name.is_empty() {
        return PathBuf::new();
    }

    let name = to_disk_separators(name);
    let name = name.strip_prefix("./").unwrap_or(&name);
    if Path::new(name).is_absolute() {
        return PathBuf::from(name);
    }

    let mut resolved = base_dir.to_path_buf();
    if let Some(folder) = folder.filter(|f| !f.is_empty()) {
        let folder = to_disk_separators(folder);
        resolved.push(folder.strip_prefix("./").unwrap_or(&folder));
    }
    resolved.push(name);
    resolved
}

/// Express `full` relative to `base_dir`
///
/// The prefix match is case-insensitive. When `full` does not live under
/// `base_dir` it is returned unchanged.
pub fn relative_path(base_dir: &Path, full: &Path) -> String {
    let full = to_disk_separators(&full.to_string_lossy());
    let base = to_disk_separators(&base_dir.to_string_lossy());
    let base = base.trim_end_matches('/');

    if base.is_empty() || !full.is_char_boundary(base.len()) {
        return full;
    }

    let (head, tail) = full.split_at(base.len());
    if !head.eq_ignore_ascii_case(base) {
        return full;
    }

    match tail.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None if tail.is_empty() => String::new(),
        // Prefix matched only part of a component, e.g. "assets" vs "assets2"
        None => full,
    }
}

/// Final component of a path (everything after the last separator)
pub fn file_title(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Directory part of a path (everything before the last separator)
pub fn file_dir(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}
