//! File access service
//!
//! Wires the folder registry, path resolver, cluster directory and performance
//! model together. Every collaborator is passed in explicitly; nothing here is
//! process-global, so several services (or tests) can coexist.

use crate::cluster::ClusterDirectory;
use crate::config::CoreConfig;
use crate::error::ApiError;
use crate::folder::{FolderRegistry, PathResolver, ResolvedPath};
use crate::peer::{PeerStats, PerformanceModel};
use crate::reader::{BlockReader, FetchOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Opens block readers by virtual path.
#[derive(Clone)]
pub struct FileAccess {
    resolver: PathResolver,
    directory: Arc<dyn ClusterDirectory>,
    model: Arc<PerformanceModel>,
    options: FetchOptions,
}

impl FileAccess {
    pub fn new(
        resolver: PathResolver,
        directory: Arc<dyn ClusterDirectory>,
        model: Arc<PerformanceModel>,
    ) -> Self {
        Self {
            resolver,
            directory,
            model,
            options: FetchOptions::default(),
        }
    }

    /// Build a service from configuration; folder roots must exist locally.
    pub fn from_config(
        config: &CoreConfig,
        directory: Arc<dyn ClusterDirectory>,
    ) -> Result<Self, ApiError> {
        let registry = Arc::new(FolderRegistry::from_config(config)?);
        let resolver = PathResolver::new(registry, config.scheme.clone());
        let model = Arc::new(PerformanceModel::with_error_penalty(
            config.scoring.error_penalty,
        ));
        Ok(Self::new(resolver, directory, model).with_options(config.fetch.options()))
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn model(&self) -> &Arc<PerformanceModel> {
        &self.model
    }

    pub fn resolve(&self, virtual_path: &str) -> Result<ResolvedPath, ApiError> {
        self.resolver.resolve(virtual_path)
    }

    /// Virtual path for a local file inside one of the registered folders
    pub fn virtual_path_for(&self, local: &Path) -> Result<String, ApiError> {
        self.resolver.to_virtual(local)
    }

    /// Resolve a virtual path and open a reader over the file it names.
    pub async fn open(&self, virtual_path: &str) -> Result<BlockReader, ApiError> {
        let resolved = self.resolver.resolve(virtual_path)?;
        debug!(
            virtual_path,
            folder = %resolved.folder_id,
            local = %resolved.local.display(),
            "resolved virtual path"
        );
        let reader = BlockReader::open(
            self.directory.clone(),
            self.model.clone(),
            &resolved.folder_id,
            &resolved.relative,
        )
        .await?;
        Ok(reader.with_options(self.options.clone()))
    }

    /// Current peer statistics, best first
    pub fn peer_stats(&self) -> Vec<PeerStats> {
        self.model.snapshot()
    }
}
