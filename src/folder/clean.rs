//! Lexical path normalization.
//!
//! Nothing here touches the filesystem: `.` and `..` are resolved textually and
//! repeated separators collapse, so the result can be checked before any join.

use std::path::{Component, Path, PathBuf};

/// Normalize a `/`-separated relative path string.
///
/// A `..` that would climb above the start is kept for unrooted input (so the
/// caller can see the escape) and dropped for rooted input. Empty input cleans to `.`.
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last().copied() {
                Some(last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            name => parts.push(name),
        }
    }

    let body = parts.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{}", body),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Normalize a native path by components.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last().copied() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Compute the lexical path that leads from `base` to `target`.
///
/// Returns `None` when one path is rooted and the other is not, since no
/// relative path connects them.
pub fn relative_to(base: &Path, target: &Path) -> Option<PathBuf> {
    let base = clean_path(base);
    let target = clean_path(target);
    if base.has_root() != target.has_root() {
        return None;
    }

    let base_parts: Vec<Component<'_>> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let target_parts: Vec<Component<'_>> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = base_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base_parts.len() {
        rel.push("..");
    }
    for part in &target_parts[common..] {
        rel.push(part.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    Some(rel)
}

/// Whether a cleaned relative path leaves the directory it is relative to.
pub fn escapes_root(rel: &Path) -> bool {
    if rel.has_root() || rel.is_absolute() {
        return true;
    }
    matches!(
        rel.components().next(),
        Some(Component::ParentDir) | Some(Component::Prefix(_))
    )
}
