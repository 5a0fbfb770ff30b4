//! Cluster Directory contract
//!
//! The cluster directory is the external collaborator that knows each file's
//! block layout and which peers hold which blocks. Readers depend on it only
//! through the [`ClusterDirectory`] trait so it can be swapped for a test double.

pub mod memory;

use crate::error::{ApiError, FetchError};
use crate::types::PeerID;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque name for the exact bytes of a block (content address or equivalent).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockToken(pub Vec<u8>);

impl fmt::Debug for BlockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockToken({})", hex::encode(&self.0))
    }
}

impl fmt::Display for BlockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// A byte range of a file, tracked and transferred independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: usize,
    pub offset: u64,
    pub length: u32,
    pub token: BlockToken,
}

impl Block {
    /// Exclusive end offset of the block within the file
    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.length)
    }
}

/// Point-in-time snapshot of a file's size and block layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub path: String,
    pub size: u64,
    pub blocks: Vec<Block>,
}

impl FileDescriptor {
    /// Build a descriptor from consecutive block lengths and their tokens.
    pub fn from_blocks<I>(path: impl Into<String>, blocks: I) -> Self
    where
        I: IntoIterator<Item = (u32, BlockToken)>,
    {
        let mut offset = 0u64;
        let blocks: Vec<Block> = blocks
            .into_iter()
            .enumerate()
            .map(|(index, (length, token))| {
                let block = Block {
                    index,
                    offset,
                    length,
                    token,
                };
                offset += u64::from(length);
                block
            })
            .collect();
        Self {
            path: path.into(),
            size: offset,
            blocks,
        }
    }

    /// Check the block list is ordered, contiguous, gapless and sums to `size`.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut expected_offset = 0u64;
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position {
                return Err(ApiError::InvalidDescriptor(format!(
                    "{}: block at position {} has index {}",
                    self.path, position, block.index
                )));
            }
            if block.offset != expected_offset {
                return Err(ApiError::InvalidDescriptor(format!(
                    "{}: block {} starts at {}, expected {}",
                    self.path, block.index, block.offset, expected_offset
                )));
            }
            expected_offset = block.end();
        }
        if expected_offset != self.size {
            return Err(ApiError::InvalidDescriptor(format!(
                "{}: blocks cover {} bytes, size is {}",
                self.path, expected_offset, self.size
            )));
        }
        Ok(())
    }
}

/// A peer that can serve a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerRef {
    pub peer: PeerID,
    /// Data would come from a temporary or partial copy rather than a verified one
    pub temporary: bool,
}

impl PeerRef {
    pub fn new(peer: impl Into<PeerID>) -> Self {
        Self {
            peer: peer.into(),
            temporary: false,
        }
    }

    pub fn temporary(peer: impl Into<PeerID>) -> Self {
        Self {
            peer: peer.into(),
            temporary: true,
        }
    }
}

/// Knowledge of file layouts and block holders across the cluster.
///
/// Fetches are cancelled by dropping the returned future, so implementations
/// must not rely on running to completion.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    /// Block layout of a file, or `None` if the cluster does not know it.
    async fn file_descriptor(&self, folder_id: &str, path: &str) -> Option<FileDescriptor>;

    /// Peers currently able to serve `block`, in the directory's own order.
    async fn block_availability(
        &self,
        folder_id: &str,
        descriptor: &FileDescriptor,
        block: &Block,
    ) -> Vec<PeerRef>;

    /// Fetch the full contents of one block from one peer.
    async fn fetch_block(
        &self,
        peer: &PeerRef,
        folder_id: &str,
        path: &str,
        block_index: usize,
        block: &Block,
    ) -> Result<Vec<u8>, FetchError>;
}
