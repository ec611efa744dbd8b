//! Concurrency front ends.
//!
//! An [`ArenaAllocator`] needs `&mut self`. To share one between threads it is
//! placed behind one of two front ends, both implementing [`SharedArena`]:
//!
//! - [`GlobalArena`]: one instance for the whole process, every call takes a
//!   lock for its full duration.
//! - [`ThreadLocalArena`]: every thread works on its own instance; nothing is
//!   shared and nothing is locked.
//!
//! The two modes are never mixed on one instance. [`DefaultMode`] names the
//! front end selected at build time with the `thread-local` cargo feature.

use cfg_if::cfg_if;

use crate::{AllocError, ArenaAllocator, ArenaStats, Block, InitError, ReleaseError};

mod global;
mod local;

pub use self::{global::GlobalArena, local::ThreadLocalArena};

cfg_if! {
    if #[cfg(feature = "thread-local")] {
        /// Front end selected by the `thread-local` feature.
        pub type DefaultMode<A> = ThreadLocalArena<A>;
    } else {
        /// Front end used unless the `thread-local` feature is enabled.
        pub type DefaultMode<A> = GlobalArena<A>;
    }
}

/// The four-operation contract as seen by threads sharing a front end.
pub trait SharedArena: Sync {
    type Allocator: ArenaAllocator;

    /// Creates the instance with an arena of `capacity` bytes.
    fn init(&self, capacity: usize) -> Result<(), InitError>;

    /// Releases the instance. Returns `false` if there was nothing to
    /// destroy.
    fn destroy(&self) -> bool;

    fn allocate(&self, size: usize) -> Result<Block, AllocError>;

    fn release(&self, block: Block) -> Result<(), ReleaseError>;

    /// Runs `f` on the instance, or returns `None` if there is none.
    ///
    /// `f` must not call back into the same front end.
    fn with<R>(&self, f: impl FnOnce(&mut Self::Allocator) -> R) -> Option<R>;

    fn stats(&self) -> Option<ArenaStats> {
        self.with(|allocator| allocator.stats())
    }
}
