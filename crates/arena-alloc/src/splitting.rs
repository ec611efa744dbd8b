//! Variable-size splitting allocator.
//!
//! The arena starts out as one free block spanning the whole capacity.
//! Allocation carves requests out of free blocks; release merges blocks back
//! together.
//!
//! # Algorithm
//!
//! Every block, free or occupied, is a member of one doubly-linked list kept
//! in address order:
//!
//! - **Allocation** walks the list from the head and picks the **first** free
//!   block whose body can hold the request plus a header for the remainder.
//!   A new header is carved right after the request and takes over the rest
//!   of the body.
//! - **Release** marks the block free and merges it with free neighbours,
//!   first to the left and then to the right, until an occupied block or the
//!   arena edge is reached.
//!
//! # Memory Layout
//!
//! ```text
//! ┌────────┬──────────────┬────────┬───────────────┬────────┬─────────┐
//! │ header │ body (used)  │ header │ body (free)   │ header │ body    │
//! └────────┴──────────────┴────────┴───────────────┴────────┴─────────┘
//!  offset(next) == offset + SPLIT_HEADER_SIZE + body_size
//! ```
//!
//! The headers themselves live in a table beside the arena, linked by table
//! index. Slots of headers that disappear in a merge are recycled by later
//! splits.
//!
//! The list always covers the arena exactly:
//! `sum(SPLIT_HEADER_SIZE + body_size) == capacity`.

use log::{debug, trace};
use snafu::ensure;

use crate::{
    AllocError, ArenaAllocator, InitError, ReleaseError, alloc_error,
    arena::Arena,
    block::{ArenaStats, Block, BlockInfo},
    config::SplitConfig,
    init_error, release_error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SplitHeader {
    prev: Option<usize>,
    next: Option<usize>,
    /// Arena offset of the header itself.
    offset: usize,
    body_size: usize,
    occupied: bool,
}

impl SplitHeader {
    fn body_start(&self) -> usize {
        self.offset + SPLIT_HEADER_SIZE
    }
}

/// Arena bytes reserved in front of every block body.
pub const SPLIT_HEADER_SIZE: usize = size_of::<SplitHeader>();

/// A first-fit allocator that splits and coalesces blocks of one arena.
///
/// # Examples
///
/// ```
/// # use arena_alloc::{ArenaAllocator as _, splitting::{SPLIT_HEADER_SIZE, SplittingAllocator}};
/// let mut allocator = SplittingAllocator::init(3000, &Default::default()).unwrap();
/// let a = allocator.allocate(500).unwrap();
/// let b = allocator.allocate(500).unwrap();
/// assert_eq!(b.offset() - a.offset(), 500 + SPLIT_HEADER_SIZE);
///
/// allocator.release(a).unwrap();
/// allocator.release(b).unwrap();
/// assert_eq!(allocator.blocks().count(), 1);
/// ```
#[derive(Debug)]
pub struct SplittingAllocator {
    arena: Arena,
    headers: Vec<Option<SplitHeader>>,
    /// Table slots freed by merges.
    vacant: Vec<usize>,
    head: usize,
}

impl SplittingAllocator {
    /// Blocks in list (and address) order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        let mut cursor = Some(self.head);
        core::iter::from_fn(move || {
            let node = self.node(cursor?);
            cursor = node.next;
            Some(BlockInfo {
                offset: node.body_start(),
                body_size: node.body_size,
                occupied: node.occupied,
            })
        })
    }

    /// Largest request the allocator could currently serve.
    #[must_use]
    pub fn max_request(&self) -> usize {
        self.blocks()
            .filter(|block| !block.occupied)
            .map(|block| block.body_size.saturating_sub(SPLIT_HEADER_SIZE))
            .max()
            .unwrap_or(0)
    }

    fn node(&self, index: usize) -> &SplitHeader {
        match &self.headers[index] {
            Some(node) => node,
            None => unreachable!("header {index} is linked but vacant"),
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut SplitHeader {
        match &mut self.headers[index] {
            Some(node) => node,
            None => unreachable!("header {index} is linked but vacant"),
        }
    }

    fn insert_node(&mut self, node: SplitHeader) -> usize {
        if let Some(index) = self.vacant.pop() {
            self.headers[index] = Some(node);
            index
        } else {
            self.headers.push(Some(node));
            self.headers.len() - 1
        }
    }

    /// Merges the block after `index` into `index`.
    fn absorb_next(&mut self, index: usize) {
        let Some(next_index) = self.node(index).next else {
            return;
        };
        let Some(next) = self.headers[next_index].take() else {
            unreachable!("header {next_index} is linked but vacant");
        };
        self.vacant.push(next_index);

        let node = self.node_mut(index);
        node.body_size += next.body_size + SPLIT_HEADER_SIZE;
        node.next = next.next;
        if let Some(after) = next.next {
            self.node_mut(after).prev = Some(index);
        }
    }
}

impl ArenaAllocator for SplittingAllocator {
    type Config = SplitConfig;

    const NAME: &'static str = "splitting";

    fn init(capacity: usize, _config: &Self::Config) -> Result<Self, InitError> {
        ensure!(
            capacity >= SPLIT_HEADER_SIZE,
            init_error::ArenaTooSmallSnafu {
                capacity,
                required: SPLIT_HEADER_SIZE
            }
        );
        let arena = Arena::new(capacity)?;
        let head = SplitHeader {
            prev: None,
            next: None,
            offset: arena.base(),
            body_size: capacity - SPLIT_HEADER_SIZE,
            occupied: false,
        };

        debug!("{}: single free block in {capacity} byte arena", Self::NAME);
        Ok(Self {
            arena,
            headers: vec![Some(head)],
            vacant: Vec::new(),
            head: 0,
        })
    }

    fn allocate(&mut self, size: usize) -> Result<Block, AllocError> {
        let capacity = self.arena.capacity();
        ensure!(
            size <= capacity,
            alloc_error::CapacityExceededSnafu {
                requested: size,
                max: capacity
            }
        );
        let needed = size + SPLIT_HEADER_SIZE;

        let mut cursor = Some(self.head);
        while let Some(index) = cursor {
            let node = *self.node(index);
            if node.occupied || node.body_size < needed {
                cursor = node.next;
                continue;
            }

            let split_at = node.body_start() + size;
            let bound = self.arena.bound();
            ensure!(
                split_at + SPLIT_HEADER_SIZE <= bound,
                alloc_error::OutOfBoundsSnafu {
                    offset: split_at,
                    bound
                }
            );

            let remainder = self.insert_node(SplitHeader {
                prev: Some(index),
                next: node.next,
                offset: split_at,
                body_size: node.body_size - needed,
                occupied: false,
            });
            if let Some(after) = node.next {
                self.node_mut(after).prev = Some(remainder);
            }
            let node = self.node_mut(index);
            node.next = Some(remainder);
            node.body_size = size;
            node.occupied = true;

            let block = Block::new(node.body_start(), size, index);
            trace!(
                "{}: block {index} at {} for {size} bytes",
                Self::NAME,
                block.offset()
            );
            return Ok(block);
        }

        debug!("{}: no free block fits {size} bytes", Self::NAME);
        alloc_error::NoFitSnafu { requested: size }.fail()
    }

    fn release(&mut self, block: Block) -> Result<(), ReleaseError> {
        let index = block.header();
        let owned = self
            .headers
            .get(index)
            .and_then(Option::as_ref)
            .is_some_and(|node| node.occupied && node.body_start() == block.offset());
        if !owned {
            debug!(
                "{}: rejected release of offset {}",
                Self::NAME,
                block.offset()
            );
            return release_error::InvalidReleaseSnafu {
                offset: block.offset(),
            }
            .fail();
        }
        self.node_mut(index).occupied = false;

        let mut current = index;
        while let Some(prev) = self.node(current).prev {
            if self.node(prev).occupied {
                break;
            }
            self.absorb_next(prev);
            current = prev;
        }
        while let Some(next) = self.node(current).next {
            if self.node(next).occupied {
                break;
            }
            self.absorb_next(current);
        }

        trace!(
            "{}: released block at {}, free block {current} now spans {} bytes",
            Self::NAME,
            block.offset(),
            self.node(current).body_size
        );
        Ok(())
    }

    fn arena(&self) -> &Arena {
        &self.arena
    }

    fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    fn stats(&self) -> ArenaStats {
        ArenaStats::from_blocks(self.arena.capacity(), SPLIT_HEADER_SIZE, self.blocks())
    }
}
