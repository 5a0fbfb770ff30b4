//! In-memory cluster directory
//!
//! Holds file contents locally and serves them as if from remote peers, with
//! scriptable per-peer behaviour. Used for local development and tests.

use super::{Block, BlockToken, ClusterDirectory, FileDescriptor, PeerRef};
use crate::error::{ApiError, FetchError};
use crate::types::{FolderID, PeerID};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How a peer answers fetch requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerBehaviour {
    /// Return the block immediately
    Serve,
    /// Return the block after a delay
    Delay(Duration),
    /// Fail every fetch with the given error
    Fail(FetchError),
    /// Return only the first half of the block
    Truncate,
    /// Never answer
    Hang,
}

/// One fetch attempt as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub peer: PeerID,
    pub path: String,
    pub block_index: usize,
}

struct StoredFile {
    descriptor: FileDescriptor,
    content: Vec<u8>,
    holders: Vec<Vec<PeerRef>>,
}

/// Cluster directory backed by in-process maps.
#[derive(Default)]
pub struct MemoryDirectory {
    files: RwLock<HashMap<(FolderID, String), StoredFile>>,
    behaviours: RwLock<HashMap<PeerID, PeerBehaviour>>,
    fetches: Mutex<Vec<FetchRecord>>,
    availability_stalled: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file split into blocks of the given lengths.
    ///
    /// The lengths must cover `content` exactly. No peer holds any block until
    /// [`MemoryDirectory::set_holders`] or [`MemoryDirectory::set_all_holders`] is called.
    pub fn insert_file(
        &self,
        folder_id: &str,
        path: &str,
        content: Vec<u8>,
        block_lengths: &[u32],
    ) -> Result<FileDescriptor, ApiError> {
        let tokens = (0..block_lengths.len()).map(|i| BlockToken((i as u64).to_be_bytes().to_vec()));
        let descriptor =
            FileDescriptor::from_blocks(path, block_lengths.iter().copied().zip(tokens));
        if descriptor.size != content.len() as u64 {
            return Err(ApiError::InvalidDescriptor(format!(
                "{}: block lengths cover {} bytes, content has {}",
                path,
                descriptor.size,
                content.len()
            )));
        }

        let holders = vec![Vec::new(); descriptor.blocks.len()];
        self.files.write().insert(
            (folder_id.to_string(), path.to_string()),
            StoredFile {
                descriptor: descriptor.clone(),
                content,
                holders,
            },
        );
        Ok(descriptor)
    }

    /// Store a file split into blocks of `block_size`, the last one possibly short.
    pub fn insert_uniform(
        &self,
        folder_id: &str,
        path: &str,
        content: Vec<u8>,
        block_size: u32,
    ) -> Result<FileDescriptor, ApiError> {
        if block_size == 0 {
            return Err(ApiError::InvalidDescriptor(format!(
                "{}: block size must be positive",
                path
            )));
        }
        let mut lengths = Vec::new();
        let mut remaining = content.len() as u64;
        while remaining > 0 {
            let take = remaining.min(u64::from(block_size));
            lengths.push(take as u32);
            remaining -= take;
        }
        self.insert_file(folder_id, path, content, &lengths)
    }

    /// Set which peers hold one block, in the order availability reports them.
    pub fn set_holders(&self, folder_id: &str, path: &str, block_index: usize, peers: Vec<PeerRef>) {
        let mut files = self.files.write();
        if let Some(file) = files.get_mut(&(folder_id.to_string(), path.to_string())) {
            if let Some(slot) = file.holders.get_mut(block_index) {
                *slot = peers;
            }
        }
    }

    /// Set the same holders for every block of a file.
    pub fn set_all_holders(&self, folder_id: &str, path: &str, peers: Vec<PeerRef>) {
        let mut files = self.files.write();
        if let Some(file) = files.get_mut(&(folder_id.to_string(), path.to_string())) {
            for slot in file.holders.iter_mut() {
                *slot = peers.clone();
            }
        }
    }

    pub fn set_behaviour(&self, peer: &str, behaviour: PeerBehaviour) {
        self.behaviours.write().insert(peer.to_string(), behaviour);
    }

    /// While stalled, availability lookups never answer.
    pub fn stall_availability(&self, stalled: bool) {
        self.availability_stalled.store(stalled, Ordering::SeqCst);
    }

    /// Every fetch attempt so far, in arrival order
    pub fn fetches(&self) -> Vec<FetchRecord> {
        self.fetches.lock().clone()
    }

    pub fn clear_fetches(&self) {
        self.fetches.lock().clear();
    }

    fn block_bytes(&self, folder_id: &str, path: &str, block: &Block) -> Result<Vec<u8>, FetchError> {
        let files = self.files.read();
        let file = files
            .get(&(folder_id.to_string(), path.to_string()))
            .ok_or(FetchError::Missing)?;
        let start = block.offset as usize;
        let end = block.end() as usize;
        file.content
            .get(start..end)
            .map(|bytes| bytes.to_vec())
            .ok_or(FetchError::Missing)
    }
}

#[async_trait]
impl ClusterDirectory for MemoryDirectory {
    async fn file_descriptor(&self, folder_id: &str, path: &str) -> Option<FileDescriptor> {
        self.files
            .read()
            .get(&(folder_id.to_string(), path.to_string()))
            .map(|file| file.descriptor.clone())
    }

    async fn block_availability(
        &self,
        folder_id: &str,
        descriptor: &FileDescriptor,
        block: &Block,
    ) -> Vec<PeerRef> {
        if self.availability_stalled.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        self.files
            .read()
            .get(&(folder_id.to_string(), descriptor.path.clone()))
            .and_then(|file| file.holders.get(block.index).cloned())
            .unwrap_or_default()
    }

    async fn fetch_block(
        &self,
        peer: &PeerRef,
        folder_id: &str,
        path: &str,
        block_index: usize,
        block: &Block,
    ) -> Result<Vec<u8>, FetchError> {
        self.fetches.lock().push(FetchRecord {
            peer: peer.peer.clone(),
            path: path.to_string(),
            block_index,
        });

        let behaviour = self
            .behaviours
            .read()
            .get(&peer.peer)
            .cloned()
            .unwrap_or(PeerBehaviour::Serve);

        match behaviour {
            PeerBehaviour::Serve => self.block_bytes(folder_id, path, block),
            PeerBehaviour::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.block_bytes(folder_id, path, block)
            }
            PeerBehaviour::Fail(err) => Err(err),
            PeerBehaviour::Truncate => {
                let mut bytes = self.block_bytes(folder_id, path, block)?;
                bytes.truncate(bytes.len() / 2);
                Ok(bytes)
            }
            PeerBehaviour::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_uniform_and_fetch() {
        let dir = MemoryDirectory::new();
        let fd = dir
            .insert_uniform("f", "a.bin", (0u8..10).collect(), 4)
            .unwrap();
        let lengths: Vec<u32> = fd.blocks.iter().map(|b| b.length).collect();
        assert_eq!(lengths, vec![4, 4, 2]);

        dir.set_all_holders("f", "a.bin", vec![PeerRef::new("p1")]);
        let peers = dir.block_availability("f", &fd, &fd.blocks[2]).await;
        assert_eq!(peers, vec![PeerRef::new("p1")]);

        let bytes = dir
            .fetch_block(&peers[0], "f", "a.bin", 2, &fd.blocks[2])
            .await
            .unwrap();
        assert_eq!(bytes, vec![8, 9]);
        assert_eq!(dir.fetches().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_file_and_mismatched_lengths() {
        let dir = MemoryDirectory::new();
        assert!(dir.file_descriptor("f", "missing").await.is_none());
        assert!(matches!(
            dir.insert_file("f", "x", vec![0; 5], &[2, 2]),
            Err(ApiError::InvalidDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn test_scripted_behaviours() {
        let dir = MemoryDirectory::new();
        let fd = dir.insert_uniform("f", "a", vec![7; 8], 8).unwrap();
        let block = &fd.blocks[0];

        dir.set_behaviour("bad", PeerBehaviour::Fail(FetchError::Unreachable("down".into())));
        dir.set_behaviour("short", PeerBehaviour::Truncate);

        let err = dir
            .fetch_block(&PeerRef::new("bad"), "f", "a", 0, block)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Unreachable("down".into()));

        let bytes = dir
            .fetch_block(&PeerRef::new("short"), "f", "a", 0, block)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 4);
    }
}
