//! Configuration
//!
//! Layered configuration for folders, peer scoring, fetch limits and logging.
//! Sources are merged by [`merge::service::MergeService`]; callers go through
//! [`facade::ConfigLoader`].

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use crate::peer::DEFAULT_ERROR_PENALTY;
use crate::reader::FetchOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default virtual path scheme.
pub const DEFAULT_SCHEME: &str = "sync";

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_error_penalty() -> u32 {
    DEFAULT_ERROR_PENALTY
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Scheme accepted in virtual paths (`<scheme>://<folder>/<path>`)
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Shared folders and their local roots
    #[serde(default)]
    pub folders: Vec<FolderConfig>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            folders: Vec::new(),
            scoring: ScoringConfig::default(),
            fetch: FetchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parse a configuration document without consulting other sources.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// One shared folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub id: String,
    pub path: PathBuf,
}

/// Peer scoring settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Multiplier on a peer's error rate; higher punishes flaky peers harder
    #[serde(default = "default_error_penalty")]
    pub error_penalty: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            error_penalty: default_error_penalty(),
        }
    }
}

/// Block fetch settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-peer attempt timeout in milliseconds; unset means no limit
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl FetchConfig {
    pub fn options(&self) -> FetchOptions {
        FetchOptions {
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}
