//! Path Resolver
//!
//! Translates `<scheme>://<folderID>/<relativePath>` into a verified local path.
//! The relative part is normalized first and then checked twice: once lexically,
//! and again after joining to the folder root by recomputing root -> joined.

use super::clean::{clean, escapes_root, relative_to};
use super::FolderRegistry;
use crate::error::ApiError;
use crate::types::FolderID;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Separator between scheme and folder id in a virtual path.
const SCHEME_SEPARATOR: &str = "://";

/// Result of resolving a virtual path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub folder_id: FolderID,
    /// Normalized folder-relative path, `/`-separated (`.` for the root itself)
    pub relative: String,
    /// Local path under the folder root
    pub local: PathBuf,
}

/// Resolver for virtual paths against a folder registry.
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<FolderRegistry>,
    scheme: String,
}

impl PathResolver {
    pub fn new(registry: Arc<FolderRegistry>, scheme: impl Into<String>) -> Self {
        Self {
            registry,
            scheme: scheme.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn registry(&self) -> &FolderRegistry {
        &self.registry
    }

    /// Resolve a virtual path to a folder id and a local path inside that folder.
    pub fn resolve(&self, virtual_path: &str) -> Result<ResolvedPath, ApiError> {
        let (scheme, rest) = virtual_path
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| ApiError::InvalidPath(virtual_path.to_string()))?;
        if scheme != self.scheme {
            return Err(ApiError::InvalidPath(format!(
                "{} (expected scheme {})",
                virtual_path, self.scheme
            )));
        }

        let (folder_id, raw_relative) = rest
            .split_once('/')
            .ok_or_else(|| ApiError::InvalidPath(virtual_path.to_string()))?;
        if folder_id.is_empty() {
            return Err(ApiError::InvalidPath(virtual_path.to_string()));
        }

        // A rooted relative part (`scheme://id//x`) escapes as surely as `..` does.
        let relative = clean(raw_relative);
        if escapes_root(Path::new(&relative)) {
            return Err(ApiError::PathTraversal(virtual_path.to_string()));
        }

        let folder = self.registry.get_or_error(folder_id)?;
        let local = if relative == "." {
            folder.root.clone()
        } else {
            folder.root.join(&relative)
        };

        // Second check on the joined result, independent of the string cleaning above.
        let back = relative_to(&folder.root, &local)
            .ok_or_else(|| ApiError::PathTraversal(virtual_path.to_string()))?;
        if escapes_root(&back) {
            return Err(ApiError::PathTraversal(virtual_path.to_string()));
        }

        Ok(ResolvedPath {
            folder_id: folder.id.clone(),
            relative,
            local,
        })
    }

    /// Build the virtual path addressing a local file, if it lies in a registered folder.
    pub fn to_virtual(&self, local: &Path) -> Result<String, ApiError> {
        let (folder, rel) = self
            .registry
            .folder_for_path(local)
            .ok_or_else(|| ApiError::FolderNotFound(local.display().to_string()))?;

        let segments: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        Ok(format!(
            "{}{}{}/{}",
            self.scheme,
            SCHEME_SEPARATOR,
            folder.id,
            segments.join("/")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folder::Folder;
    use proptest::prelude::*;

    fn resolver() -> PathResolver {
        let registry = FolderRegistry::new(vec![
            Folder::new("docs", "/data/docs"),
            Folder::new("media", "/srv/media/library"),
        ])
        .unwrap();
        PathResolver::new(Arc::new(registry), "scheme")
    }

    #[test]
    fn test_resolve_simple_path() {
        let resolved = resolver().resolve("scheme://docs/a/b.txt").unwrap();
        assert_eq!(resolved.folder_id, "docs");
        assert_eq!(resolved.relative, "a/b.txt");
        assert_eq!(resolved.local, PathBuf::from("/data/docs/a/b.txt"));
    }

    #[test]
    fn test_resolve_normalizes_before_validation() {
        let resolved = resolver().resolve("scheme://docs/a//./c/../b.txt").unwrap();
        assert_eq!(resolved.relative, "a/b.txt");
        assert_eq!(resolved.local, PathBuf::from("/data/docs/a/b.txt"));

        let root = resolver().resolve("scheme://docs/").unwrap();
        assert_eq!(root.relative, ".");
        assert_eq!(root.local, PathBuf::from("/data/docs"));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let resolver = resolver();
        for input in [
            "scheme://docs/../other",
            "scheme://docs/a/../../secret",
            "scheme://docs/..",
            "scheme://docs//etc/passwd",
        ] {
            assert!(
                matches!(resolver.resolve(input), Err(ApiError::PathTraversal(_))),
                "expected traversal for {}",
                input
            );
        }
    }

    #[test]
    fn test_rooted_relative_part_is_rejected() {
        let resolver = resolver();
        for input in ["scheme://docs//x", "scheme://media///a/b", "scheme://docs//"] {
            assert!(
                matches!(resolver.resolve(input), Err(ApiError::PathTraversal(_))),
                "expected traversal for {}",
                input
            );
        }
        let inner = resolver.resolve("scheme://docs/a//x").unwrap();
        assert_eq!(inner.relative, "a/x");
    }

    #[test]
    fn test_resolve_rejects_malformed_input() {
        let resolver = resolver();
        assert!(matches!(resolver.resolve("docs/a.txt"), Err(ApiError::InvalidPath(_))));
        assert!(matches!(resolver.resolve("scheme://docs"), Err(ApiError::InvalidPath(_))));
        assert!(matches!(resolver.resolve("scheme:///a"), Err(ApiError::InvalidPath(_))));
        assert!(matches!(resolver.resolve("other://docs/a"), Err(ApiError::InvalidPath(_))));
    }

    #[test]
    fn test_resolve_unknown_folder() {
        assert!(matches!(
            resolver().resolve("scheme://nope/a.txt"),
            Err(ApiError::FolderNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn test_to_virtual_inverts_resolve() {
        let resolver = resolver();
        let virtual_path = resolver
            .to_virtual(Path::new("/srv/media/library/films/a.mkv"))
            .unwrap();
        assert_eq!(virtual_path, "scheme://media/films/a.mkv");
        let resolved = resolver.resolve(&virtual_path).unwrap();
        assert_eq!(resolved.local, PathBuf::from("/srv/media/library/films/a.mkv"));

        assert!(matches!(
            resolver.to_virtual(Path::new("/srv/media/other.mkv")),
            Err(ApiError::FolderNotFound(_))
        ));
    }

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => "[a-z0-9_-]{1,8}",
            1 => Just(".".to_string()),
            1 => Just(String::new()),
        ]
    }

    proptest! {
        #[test]
        fn prop_resolved_paths_stay_under_root(
            folder in prop_oneof![Just("docs"), Just("media")],
            first in prop_oneof![4 => "[a-z0-9_-]{1,8}", 1 => Just(".".to_string())],
            rest in prop::collection::vec(segment(), 0..8),
        ) {
            let resolver = resolver();
            // The leading segment is never empty, so the relative part is never rooted.
            let input = format!("scheme://{}/{}/{}", folder, first, rest.join("/"));
            let resolved = resolver.resolve(&input).unwrap();
            let root = &resolver.registry().get(folder).unwrap().root;
            prop_assert!(resolved.local.starts_with(root));
            prop_assert_eq!(resolved.folder_id.as_str(), folder);
        }

        #[test]
        fn prop_climbing_past_root_is_rejected(
            folder in prop_oneof![Just("docs"), Just("media")],
            inner in prop::collection::vec("[a-z0-9_]{1,8}", 0..4),
            extra in 1usize..3,
            tail in "[a-z0-9_]{1,8}",
        ) {
            let ups = vec![".."; inner.len() + extra].join("/");
            let mut parts = inner.clone();
            parts.push(ups);
            parts.push(tail);
            let input = format!("scheme://{}/{}", folder, parts.join("/"));
            let result = resolver().resolve(&input);
            prop_assert!(matches!(result, Err(ApiError::PathTraversal(_))));
        }
    }
}
