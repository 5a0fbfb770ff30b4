//! Offset to block translation.
//!
//! Blocks are located by their recorded offsets and lengths, never by
//! `index * block_size`, so non-uniform layouts are handled the same way.

use crate::cluster::Block;
use std::ops::Range;

/// The part of one block that falls inside a requested window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpan {
    /// Position of the block in the descriptor's block list
    pub position: usize,
    /// Byte range inside the fetched block
    pub within: Range<usize>,
    /// Where those bytes land relative to the start of the window
    pub dest: usize,
}

impl BlockSpan {
    pub fn len(&self) -> usize {
        self.within.end - self.within.start
    }

    pub fn is_empty(&self) -> bool {
        self.within.is_empty()
    }
}

/// Spans of every block intersecting `[start, start + len)`, in ascending order.
pub fn blocks_in_range(blocks: &[Block], start: u64, len: u64) -> Vec<BlockSpan> {
    if len == 0 {
        return Vec::new();
    }
    let end = start.saturating_add(len);
    let first = blocks.partition_point(|b| b.end() <= start);

    blocks[first..]
        .iter()
        .enumerate()
        .take_while(|(_, b)| b.offset < end)
        .filter(|(_, b)| b.length > 0)
        .map(|(i, b)| {
            let lo = start.max(b.offset);
            let hi = end.min(b.end());
            BlockSpan {
                position: first + i,
                within: (lo - b.offset) as usize..(hi - b.offset) as usize,
                dest: (lo - start) as usize,
            }
        })
        .collect()
}
