//! Handles and read-only views shared by every allocation strategy.

use core::ops::Range;

/// Handle to a live allocation.
///
/// `offset` is the first body byte relative to the arena base; `header`
/// indexes the owning allocator's header table. The handle is only meaningful
/// for the instance that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    offset: usize,
    len: usize,
    header: usize,
}

impl Block {
    pub(crate) const fn new(offset: usize, len: usize, header: usize) -> Self {
        Self {
            offset,
            len,
            header,
        }
    }

    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes requested at allocation time.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    pub(crate) const fn header(&self) -> usize {
        self.header
    }
}

/// One entry of an allocator's block list, in address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the first body byte.
    pub offset: usize,
    pub body_size: usize,
    pub occupied: bool,
}

impl BlockInfo {
    #[must_use]
    pub const fn body_range(&self) -> Range<usize> {
        self.offset..self.offset + self.body_size
    }
}

/// Snapshot of arena usage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub capacity: usize,
    /// Bytes reserved for block headers.
    pub header_bytes: usize,
    /// Body bytes of occupied blocks.
    pub used_bytes: usize,
    /// Body bytes of free blocks.
    pub free_bytes: usize,
    pub live_blocks: usize,
    pub free_blocks: usize,
    /// Body size of the largest free block.
    pub largest_free: usize,
}

impl ArenaStats {
    /// Accumulates the stats of a block list.
    pub(crate) fn from_blocks<I>(capacity: usize, header_size: usize, blocks: I) -> Self
    where
        I: IntoIterator<Item = BlockInfo>,
    {
        blocks.into_iter().fold(
            Self {
                capacity,
                ..Self::default()
            },
            |mut stats, block| {
                stats.header_bytes += header_size;
                if block.occupied {
                    stats.used_bytes += block.body_size;
                    stats.live_blocks += 1;
                } else {
                    stats.free_bytes += block.body_size;
                    stats.free_blocks += 1;
                    stats.largest_free = stats.largest_free.max(block.body_size);
                }
                stats
            },
        )
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_range() {
        let block = Block::new(40, 16, 3);
        assert_eq!(block.range(), 40..56);
        assert_eq!(block.header(), 3);
        assert!(!block.is_empty());
        assert!(Block::new(40, 0, 0).is_empty());
    }

    #[test]
    fn test_stats_from_blocks() {
        let blocks = [
            BlockInfo {
                offset: 8,
                body_size: 100,
                occupied: true,
            },
            BlockInfo {
                offset: 116,
                body_size: 30,
                occupied: false,
            },
            BlockInfo {
                offset: 154,
                body_size: 46,
                occupied: false,
            },
        ];
        let stats = ArenaStats::from_blocks(208, 8, blocks);
        assert_eq!(
            stats,
            ArenaStats {
                capacity: 208,
                header_bytes: 24,
                used_bytes: 100,
                free_bytes: 76,
                live_blocks: 1,
                free_blocks: 2,
                largest_free: 46,
            }
        );
    }
}
