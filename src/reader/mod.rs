//! Block Store Reader
//!
//! Seek/read over one file whose blocks live on cluster peers. Each read maps the
//! requested window to blocks, ranks the peers holding each block with the shared
//! [`PerformanceModel`], and tries them in order until one delivers.
//!
//! A reader is a file handle: one caller at a time. Many readers may share one
//! directory and one model.

pub mod span;

use crate::cluster::{Block, ClusterDirectory, FileDescriptor};
use crate::error::{ApiError, FetchError, PartialRead};
use crate::peer::PerformanceModel;
use crate::types::FolderID;
use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-attempt fetch settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound for a single peer attempt; an attempt that exceeds it counts as failed
    pub timeout: Option<Duration>,
}

/// Random-access reader over a block-distributed file.
pub struct BlockReader {
    directory: Arc<dyn ClusterDirectory>,
    model: Arc<PerformanceModel>,
    options: FetchOptions,
    descriptor: FileDescriptor,
    folder_id: FolderID,
    path: String,
    offset: u64,
}

impl BlockReader {
    /// Open a reader over `path` in `folder_id`.
    ///
    /// The descriptor fetched here is the reader's view of the file for its
    /// whole lifetime.
    pub async fn open(
        directory: Arc<dyn ClusterDirectory>,
        model: Arc<PerformanceModel>,
        folder_id: &str,
        path: &str,
    ) -> Result<Self, ApiError> {
        let descriptor = directory
            .file_descriptor(folder_id, path)
            .await
            .ok_or_else(|| ApiError::NotFound {
                folder_id: folder_id.to_string(),
                path: path.to_string(),
            })?;
        descriptor.validate()?;

        info!(
            folder = folder_id,
            path,
            size = descriptor.size,
            blocks = descriptor.blocks.len(),
            "opened block reader"
        );

        Ok(Self {
            directory,
            model,
            options: FetchOptions::default(),
            descriptor,
            folder_id: folder_id.to_string(),
            path: path.to_string(),
            offset: 0,
        })
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// File size according to the descriptor snapshot
    pub fn len(&self) -> u64 {
        self.descriptor.size
    }

    pub fn is_empty(&self) -> bool {
        self.descriptor.size == 0
    }

    /// Current offset; may lie beyond `len()`
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Move the offset. Positions past the end are allowed; negative ones are not.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, ApiError> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.descriptor.size) + i128::from(delta),
        };
        let target = u64::try_from(target).map_err(|_| {
            ApiError::InvalidSeek(format!(
                "{:?} from offset {} lands at {}",
                pos, self.offset, target
            ))
        })?;
        self.offset = target;
        Ok(target)
    }

    /// Read into `buf` from the current offset.
    ///
    /// Returns `Ok(0)` at or past the end of the file. On failure the error
    /// carries how many bytes at the front of `buf` were filled; the offset has
    /// already advanced by that amount, so a later read resumes where this one stopped.
    pub async fn read(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, PartialRead> {
        if self.offset >= self.descriptor.size || buf.is_empty() {
            return Ok(0);
        }
        let wanted = (buf.len() as u64).min(self.descriptor.size - self.offset);
        let spans = span::blocks_in_range(&self.descriptor.blocks, self.offset, wanted);

        let mut copied = 0usize;
        for span in spans {
            let block = &self.descriptor.blocks[span.position];
            let fetched = if cancel.is_cancelled() {
                Err(ApiError::Canceled)
            } else {
                self.fetch_block(block, cancel).await
            };

            match fetched {
                Ok(data) => {
                    buf[span.dest..span.dest + span.len()].copy_from_slice(&data[span.within.clone()]);
                    copied += span.len();
                }
                Err(err) => {
                    warn!(
                        folder = %self.folder_id,
                        path = %self.path,
                        offset = self.offset,
                        copied,
                        error = %err,
                        "read stopped early"
                    );
                    self.offset += copied as u64;
                    return Err(PartialRead::new(copied, err));
                }
            }
        }

        self.offset += copied as u64;
        Ok(copied)
    }

    /// Fetch one block from the best-ranked peer that can deliver it.
    async fn fetch_block(
        &self,
        block: &Block,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ApiError> {
        let mut candidates = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Canceled),
            peers = self.directory.block_availability(&self.folder_id, &self.descriptor, block) => peers,
        };
        if candidates.is_empty() {
            return Err(ApiError::NoPeersAvailable {
                block_index: block.index,
            });
        }
        self.model.rank(&mut candidates, |c| c.peer.as_str());

        for candidate in &candidates {
            let started = Instant::now();
            let attempt = self.directory.fetch_block(
                candidate,
                &self.folder_id,
                &self.path,
                block.index,
                block,
            );
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Canceled),
                result = self.bounded(attempt) => result,
            };
            let elapsed = started.elapsed();

            let outcome = outcome.and_then(|data| {
                if data.len() == block.length as usize {
                    Ok(data)
                } else {
                    Err(FetchError::LengthMismatch {
                        expected: block.length as usize,
                        actual: data.len(),
                    })
                }
            });
            self.model
                .record(&candidate.peer, elapsed, outcome.as_ref().map(|_| ()));

            match outcome {
                Ok(data) => {
                    debug!(
                        peer = %candidate.peer,
                        temporary = candidate.temporary,
                        block = block.index,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "fetched block"
                    );
                    return Ok(data);
                }
                Err(err) => {
                    warn!(
                        peer = %candidate.peer,
                        block = block.index,
                        error = %err,
                        "block fetch failed, trying next peer"
                    );
                }
            }
        }

        Err(ApiError::AllPeersFailed {
            block_index: block.index,
            attempts: candidates.len(),
        })
    }

    async fn bounded<F>(&self, attempt: F) -> Result<Vec<u8>, FetchError>
    where
        F: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or_else(|_| Err(FetchError::Timeout(limit))),
            None => attempt.await,
        }
    }
}
