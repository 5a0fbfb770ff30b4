//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::CoreConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, an optional explicit file, and environment.
    pub fn load(explicit_file: Option<&Path>) -> Result<CoreConfig, ConfigError> {
        MergeService::load(explicit_file)
    }

    /// Load configuration from a specific file with environment overlay only.
    pub fn load_from_file(path: &Path) -> Result<CoreConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Create default configuration.
    pub fn default() -> CoreConfig {
        CoreConfig::default()
    }
}
