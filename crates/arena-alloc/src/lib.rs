//! Arena allocators for memory benchmarks.
//!
//! Every allocator in this crate manages a single contiguous byte arena that
//! is reserved once at [`init`](ArenaAllocator::init) and handed back at
//! [`destroy`](ArenaAllocator::destroy). Callers see a four-operation
//! contract: `init`, `destroy`, `allocate` and `release`.
//!
//! # Available Allocators
//!
//! ## [`FixedSlotPool`](fixed_slot::FixedSlotPool)
//!
//! The arena is cut into equal-size slots when the pool is created.
//! Allocation takes the first free slot; release flips the slot back to free
//! and patches the free list around it. Requests larger than the slot size are
//! rejected.
//!
//! ## [`SplittingAllocator`](splitting::SplittingAllocator)
//!
//! The arena starts as one large free block. Allocation searches the block
//! list first-fit and splits off the remainder; release merges the block with
//! free neighbours on both sides.
//!
//! # Concurrency
//!
//! Allocators are plain values and need `&mut self`. The [`sync`] module puts
//! them behind either a global lock ([`GlobalArena`](sync::GlobalArena)) or
//! per-thread instances ([`ThreadLocalArena`](sync::ThreadLocalArena)).
//!
//! # Usage
//!
//! ```rust
//! use arena_alloc::{ArenaAllocator as _, splitting::SplittingAllocator};
//!
//! let mut allocator = SplittingAllocator::init(4096, &Default::default()).unwrap();
//! let block = allocator.allocate(64).unwrap();
//! allocator.body_mut(&block).unwrap().fill(0xab);
//! allocator.release(block).unwrap();
//! allocator.destroy();
//! ```
//!
//! # Memory Layout
//!
//! Block headers are not stored inside the arena bytes. Each allocator keeps
//! a header table next to the arena and reserves `header_size` bytes of the
//! arena in front of every body, so offsets and sizes follow the classic
//! header-before-body layout without any pointer casts.
//!
//! | Allocator | Allocation | Release | Overhead |
//! |-----------|------------|---------|----------|
//! | `FixedSlotPool` | O(n) worst | O(n) worst | one header per slot |
//! | `SplittingAllocator` | O(blocks) | O(1) | one header per block |
//!
//! Release in `SplittingAllocator` is constant time because free neighbours
//! are merged as soon as they appear: no two free blocks are ever adjacent,
//! so a released block absorbs at most one neighbour on each side.

#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use std::collections::TryReserveError;

use log::debug;
use snafu::Snafu;
use snafu_utils::Location;

pub mod arena;
pub mod block;
pub mod config;
pub mod fixed_slot;
pub mod splitting;
pub mod sync;

pub use self::{
    arena::Arena,
    block::{ArenaStats, Block, BlockInfo},
    config::{SlotPoolConfig, SplitConfig},
};

/// Errors returned while creating an allocator instance.
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum InitError {
    #[snafu(display(
        "arena of {capacity} bytes cannot hold a single block of {required} bytes"
    ))]
    ArenaTooSmall {
        capacity: usize,
        required: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to reserve {capacity} bytes for the arena"))]
    ArenaAlloc {
        capacity: usize,
        #[snafu(source)]
        source: TryReserveError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("invalid allocator configuration: {reason}"))]
    InvalidConfig {
        reason: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("allocator is already initialized"))]
    AlreadyInitialized {
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors returned by `allocate`.
///
/// A failed allocation never changes allocator state.
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum AllocError {
    #[snafu(display("request of {requested} bytes exceeds the largest servable size {max}"))]
    CapacityExceeded {
        requested: usize,
        max: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("all {slots} slots of the pool are occupied"))]
    PoolExhausted {
        slots: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("no free block can hold {requested} bytes"))]
    NoFit {
        requested: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("split at offset {offset} would cross the arena bound {bound}"))]
    OutOfBounds {
        offset: usize,
        bound: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("allocator is not initialized"))]
    Uninitialized {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("failed to initialize the allocator of this thread"))]
    LazyInit {
        #[snafu(source)]
        source: InitError,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors returned by `release`.
///
/// Detection is best-effort: a handle whose header has since been reused by
/// a new live block cannot be told apart from that block.
#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum ReleaseError {
    #[snafu(display("block at offset {offset} is not a live allocation of this arena"))]
    InvalidRelease {
        offset: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("allocator is not initialized"))]
    Uninitialized {
        #[snafu(implicit)]
        location: Location,
    },
}

/// The four-operation contract shared by every allocation strategy.
///
/// Both strategies implement this trait so the front ends in [`sync`] are
/// written once against it.
pub trait ArenaAllocator: Sized + Send {
    /// Strategy-specific tunables.
    type Config: Clone + Default + Send + Sync + core::fmt::Debug;

    /// Short name used in log lines.
    const NAME: &'static str;

    /// Reserves an arena of `capacity` bytes and lays out the initial blocks.
    fn init(capacity: usize, config: &Self::Config) -> Result<Self, InitError>;

    /// Hands out a block whose body holds at least `size` bytes.
    fn allocate(&mut self, size: usize) -> Result<Block, AllocError>;

    /// Returns a block obtained from [`allocate`](Self::allocate) on this
    /// instance.
    ///
    /// Releasing a block twice, or a block of another instance, is a caller
    /// error. It is reported as [`ReleaseError::InvalidRelease`] when the
    /// handle does not match a live block and is otherwise undefined.
    fn release(&mut self, block: Block) -> Result<(), ReleaseError>;

    fn arena(&self) -> &Arena;

    fn arena_mut(&mut self) -> &mut Arena;

    fn stats(&self) -> ArenaStats;

    /// Releases the arena. No operation may follow.
    fn destroy(self) {
        debug!(
            "{}: destroying arena of {} bytes",
            Self::NAME,
            self.arena().capacity()
        );
        drop(self);
    }

    /// Body bytes of `block`, or `None` if the handle lies outside the arena.
    fn body(&self, block: &Block) -> Option<&[u8]> {
        self.arena().bytes(block.range())
    }

    fn body_mut(&mut self, block: &Block) -> Option<&mut [u8]> {
        self.arena_mut().bytes_mut(block.range())
    }
}
