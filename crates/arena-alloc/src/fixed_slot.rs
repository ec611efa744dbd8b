//! Fixed-slot pool allocator.
//!
//! The arena is cut into `capacity / (header_size + slot_size)` slots when
//! the pool is created. Every slot is a header followed by `slot_size` body
//! bytes:
//!
//! ```text
//! ┌────────┬───────────────┬────────┬───────────────┬─────┬───────┐
//! │ header │ body (slot 0) │ header │ body (slot 1) │ ... │ slack │
//! └────────┴───────────────┴────────┴───────────────┴─────┴───────┘
//!  <-------- stride -------->
//! ```
//!
//! Headers live in a table beside the arena; the arena only reserves their
//! bytes. A singly-linked free list threads through the unoccupied headers in
//! address order, starting at `free_head`.
//!
//! # Algorithm
//!
//! - **Allocation** takes the free-list head, marks it occupied and follows
//!   `next_free` links past occupied headers to find the new head.
//! - **Release** marks the slot free, links it to the nearest free slot after
//!   it and links the nearest free slot before it to the freed slot (or makes
//!   the freed slot the head). Only the two neighbouring links are repaired;
//!   the list is never rebuilt.
//!
//! Both operations are O(n) in the number of slots in the worst case.

use log::{debug, trace};
use snafu::{ResultExt as _, ensure};

use crate::{
    AllocError, ArenaAllocator, InitError, ReleaseError, alloc_error,
    arena::Arena,
    block::{ArenaStats, Block, BlockInfo},
    config::SlotPoolConfig,
    init_error, release_error,
};

/// Per-slot bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotHeader {
    /// Next free slot in address order, `None` at the end of the list.
    next_free: Option<usize>,
    occupied: bool,
}

/// Arena bytes reserved in front of every slot body.
pub const SLOT_HEADER_SIZE: usize = size_of::<SlotHeader>();

/// An allocator handing out equal-size slots of a single arena.
///
/// # Examples
///
/// ```
/// # use arena_alloc::{ArenaAllocator as _, SlotPoolConfig, fixed_slot::FixedSlotPool};
/// let config = SlotPoolConfig::new().with_slot_size(64);
/// let mut pool = FixedSlotPool::init(4096, &config).unwrap();
/// let block = pool.allocate(48).unwrap();
/// pool.release(block).unwrap();
/// ```
#[derive(Debug)]
pub struct FixedSlotPool {
    arena: Arena,
    slot_size: usize,
    headers: Vec<SlotHeader>,
    free_head: Option<usize>,
}

impl FixedSlotPool {
    #[must_use]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.headers.len()
    }

    /// Distance between two consecutive slot headers.
    #[must_use]
    pub fn stride(&self) -> usize {
        SLOT_HEADER_SIZE + self.slot_size
    }

    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.headers.iter().filter(|h| !h.occupied).count()
    }

    /// Whether slot `index` is occupied, or `None` if there is no such slot.
    #[must_use]
    pub fn is_occupied(&self, index: usize) -> Option<bool> {
        self.headers.get(index).map(|h| h.occupied)
    }

    /// Slots in address order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.headers
            .iter()
            .enumerate()
            .map(|(index, header)| BlockInfo {
                offset: self.body_offset(index),
                body_size: self.slot_size,
                occupied: header.occupied,
            })
    }

    fn body_offset(&self, index: usize) -> usize {
        index * self.stride() + SLOT_HEADER_SIZE
    }

    /// Steps back from a body offset to the index of the owning header.
    fn slot_of(&self, offset: usize) -> Option<usize> {
        let header_offset = offset.checked_sub(SLOT_HEADER_SIZE)?;
        if !header_offset.is_multiple_of(self.stride()) {
            return None;
        }
        let index = header_offset / self.stride();
        (index < self.headers.len()).then_some(index)
    }
}

impl ArenaAllocator for FixedSlotPool {
    type Config = SlotPoolConfig;

    const NAME: &'static str = "fixed-slot";

    fn init(capacity: usize, config: &Self::Config) -> Result<Self, InitError> {
        ensure!(
            config.slot_size > 0,
            init_error::InvalidConfigSnafu {
                reason: "slot size must not be zero"
            }
        );
        let Some(stride) = SLOT_HEADER_SIZE.checked_add(config.slot_size) else {
            return init_error::InvalidConfigSnafu {
                reason: "slot size overflows the address space",
            }
            .fail();
        };
        let slot_count = capacity / stride;
        ensure!(
            slot_count > 0,
            init_error::ArenaTooSmallSnafu {
                capacity,
                required: stride
            }
        );

        let arena = Arena::new(capacity)?;
        let mut headers = Vec::new();
        headers
            .try_reserve_exact(slot_count)
            .context(init_error::ArenaAllocSnafu { capacity })?;
        headers.extend((0..slot_count).map(|index| SlotHeader {
            next_free: (index + 1 < slot_count).then_some(index + 1),
            occupied: false,
        }));

        debug!(
            "{}: {slot_count} slots of {} bytes in {capacity} byte arena",
            Self::NAME,
            config.slot_size
        );
        Ok(Self {
            arena,
            slot_size: config.slot_size,
            headers,
            free_head: Some(0),
        })
    }

    fn allocate(&mut self, size: usize) -> Result<Block, AllocError> {
        ensure!(
            size <= self.slot_size,
            alloc_error::CapacityExceededSnafu {
                requested: size,
                max: self.slot_size
            }
        );
        let Some(index) = self.free_head else {
            debug!("{}: pool exhausted, request of {size} bytes", Self::NAME);
            return alloc_error::PoolExhaustedSnafu {
                slots: self.headers.len(),
            }
            .fail();
        };
        debug_assert!(!self.headers[index].occupied, "free list head is occupied");
        self.headers[index].occupied = true;

        let mut next = self.headers[index].next_free;
        while let Some(candidate) = next {
            if !self.headers[candidate].occupied {
                break;
            }
            next = self.headers[candidate].next_free;
        }
        self.free_head = next;
        self.headers[index].next_free = None;

        let block = Block::new(self.body_offset(index), size, index);
        trace!(
            "{}: slot {index} at {} for {size} bytes",
            Self::NAME,
            block.offset()
        );
        Ok(block)
    }

    fn release(&mut self, block: Block) -> Result<(), ReleaseError> {
        let owner = self
            .slot_of(block.offset())
            .filter(|&index| index == block.header() && self.headers[index].occupied);
        let Some(index) = owner else {
            debug!(
                "{}: rejected release of offset {}",
                Self::NAME,
                block.offset()
            );
            return release_error::InvalidReleaseSnafu {
                offset: block.offset(),
            }
            .fail();
        };
        self.headers[index].occupied = false;

        let next_free = (index + 1..self.headers.len()).find(|&i| !self.headers[i].occupied);
        self.headers[index].next_free = next_free;

        match (0..index).rev().find(|&i| !self.headers[i].occupied) {
            Some(prev_free) => self.headers[prev_free].next_free = Some(index),
            None => self.free_head = Some(index),
        }

        trace!("{}: released slot {index}", Self::NAME);
        Ok(())
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    fn stats(&self) -> ArenaStats {
        ArenaStats::from_blocks(self.arena.capacity(), SLOT_HEADER_SIZE, self.blocks())
    }
}
