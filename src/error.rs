//! Error types
//!
//! `ApiError` is the taxonomy surfaced to callers. `FetchError` describes a single
//! failed attempt against one peer and is absorbed by peer fallback.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by path resolution, reader construction, seek and read.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid virtual path: {0}")]
    InvalidPath(String),

    #[error("Path escapes folder root: {0}")]
    PathTraversal(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("File not found in folder {folder_id}: {path}")]
    NotFound { folder_id: String, path: String },

    #[error("No peers hold block {block_index}")]
    NoPeersAvailable { block_index: usize },

    #[error("All {attempts} peers failed for block {block_index}")]
    AllPeersFailed { block_index: usize, attempts: usize },

    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    #[error("Read canceled")]
    Canceled,

    #[error("Invalid file descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid folder: {0}")]
    InvalidFolder(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A read that stopped early.
///
/// `copied` bytes at the front of the caller's buffer are valid and the reader's
/// offset has already advanced past them, so the caller may resume from there.
#[derive(Debug, Error)]
#[error("read stopped after {copied} bytes: {source}")]
pub struct PartialRead {
    pub copied: usize,
    #[source]
    pub source: ApiError,
}

impl PartialRead {
    pub fn new(copied: usize, source: ApiError) -> Self {
        Self { copied, source }
    }
}

/// Failure of one fetch attempt against one peer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    #[error("peer does not hold the block")]
    Missing,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetched {actual} bytes, block records {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}
