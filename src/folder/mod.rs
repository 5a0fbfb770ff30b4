//! Folder Registry
//!
//! In-memory mapping of folder identifier to local root directory. The registry
//! is built once from configuration and is read-only afterwards, so it is shared
//! behind an `Arc` without locking.

pub mod clean;
pub mod resolver;

use crate::config::CoreConfig;
use crate::error::ApiError;
use crate::types::FolderID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use resolver::{PathResolver, ResolvedPath};

/// A shared folder and the local directory it is rooted at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderID,
    pub root: PathBuf,
}

impl Folder {
    pub fn new(id: impl Into<FolderID>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }
}

/// Folder registry: folder id -> root directory
#[derive(Debug, Clone, Default)]
pub struct FolderRegistry {
    folders: Vec<Folder>,
    by_id: HashMap<FolderID, usize>,
}

impl FolderRegistry {
    /// Build a registry from folders, validating ids and roots lexically.
    ///
    /// Roots must be absolute and ids unique and non-empty. No filesystem access
    /// happens here; use [`FolderRegistry::from_config`] to also verify the roots exist.
    pub fn new(folders: Vec<Folder>) -> Result<Self, ApiError> {
        let mut registry = Self::default();
        for folder in folders {
            registry.insert(folder)?;
        }
        Ok(registry)
    }

    /// Build a registry from configuration, requiring each root to be an
    /// existing directory and storing its canonical form.
    pub fn from_config(config: &CoreConfig) -> Result<Self, ApiError> {
        let mut folders = Vec::with_capacity(config.folders.len());
        for entry in &config.folders {
            if !entry.path.is_dir() {
                return Err(ApiError::InvalidFolder(format!(
                    "Root of folder {} is not a directory: {}",
                    entry.id,
                    entry.path.display()
                )));
            }
            let root = dunce::canonicalize(&entry.path).map_err(|e| {
                ApiError::InvalidFolder(format!(
                    "Failed to canonicalize root of folder {}: {}",
                    entry.id, e
                ))
            })?;
            debug!(folder = %entry.id, root = %root.display(), "registered folder");
            folders.push(Folder::new(entry.id.clone(), root));
        }
        Self::new(folders)
    }

    fn insert(&mut self, folder: Folder) -> Result<(), ApiError> {
        if folder.id.is_empty() || folder.id.contains('/') {
            return Err(ApiError::InvalidFolder(format!(
                "Folder id must be non-empty and contain no '/': {:?}",
                folder.id
            )));
        }
        if !folder.root.is_absolute() {
            return Err(ApiError::InvalidFolder(format!(
                "Root of folder {} must be absolute: {}",
                folder.id,
                folder.root.display()
            )));
        }
        if self.by_id.contains_key(&folder.id) {
            return Err(ApiError::InvalidFolder(format!(
                "Duplicate folder id: {}",
                folder.id
            )));
        }
        let root = clean::clean_path(&folder.root);
        self.by_id.insert(folder.id.clone(), self.folders.len());
        self.folders.push(Folder::new(folder.id, root));
        Ok(())
    }

    /// Get a folder by id
    pub fn get(&self, folder_id: &str) -> Option<&Folder> {
        self.by_id.get(folder_id).map(|&i| &self.folders[i])
    }

    /// Get a folder by id or return an error
    pub fn get_or_error(&self, folder_id: &str) -> Result<&Folder, ApiError> {
        self.get(folder_id)
            .ok_or_else(|| ApiError::FolderNotFound(folder_id.to_string()))
    }

    /// All registered folders, in registration order
    pub fn list_folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Find which folder a local path belongs to.
    ///
    /// Matching is by whole path components on the lexically cleaned path, so a
    /// root of `/data/docs` never claims `/data/docs2`. With nested roots the
    /// deepest one wins. Returns the folder and the path relative to its root.
    pub fn folder_for_path(&self, local: &Path) -> Option<(&Folder, PathBuf)> {
        let local = clean::clean_path(local);
        self.folders
            .iter()
            .filter_map(|folder| {
                local
                    .strip_prefix(&folder.root)
                    .ok()
                    .map(|rel| (folder, rel.to_path_buf()))
            })
            .max_by_key(|(folder, _)| folder.root.components().count())
    }
}
