use log::{info, warn};
use snafu::{OptionExt as _, ensure};
use snafu_utils::Report;
use spin::Mutex;

use super::SharedArena;
use crate::{
    AllocError, ArenaAllocator, Block, InitError, ReleaseError, alloc_error, init_error,
    release_error,
};

/// A single allocator instance shared by every thread.
///
/// Each operation holds the lock from start to end, so operations are totally
/// ordered and no thread ever observes a half-updated header chain. The order
/// in which waiting threads get the lock is unspecified, and there is no
/// timeout: a thread that never returns from a callback passed to
/// [`with`](SharedArena::with) stalls every other caller.
///
/// `new` is `const`, so the front end can live in a `static`:
///
/// ```
/// use arena_alloc::{
///     SplitConfig,
///     splitting::SplittingAllocator,
///     sync::{GlobalArena, SharedArena as _},
/// };
///
/// static ARENA: GlobalArena<SplittingAllocator> = GlobalArena::new(SplitConfig);
///
/// ARENA.init(1 << 16).unwrap();
/// let block = ARENA.allocate(128).unwrap();
/// ARENA.release(block).unwrap();
/// assert!(ARENA.destroy());
/// ```
pub struct GlobalArena<A>
where
    A: ArenaAllocator,
{
    config: A::Config,
    inner: Mutex<Option<A>>,
}

impl<A> Default for GlobalArena<A>
where
    A: ArenaAllocator,
{
    fn default() -> Self {
        Self::new(A::Config::default())
    }
}

impl<A> GlobalArena<A>
where
    A: ArenaAllocator,
{
    #[must_use]
    pub const fn new(config: A::Config) -> Self {
        Self {
            config,
            inner: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl<A> SharedArena for GlobalArena<A>
where
    A: ArenaAllocator,
{
    type Allocator = A;

    fn init(&self, capacity: usize) -> Result<(), InitError> {
        let mut inner = self.inner.lock();
        ensure!(inner.is_none(), init_error::AlreadyInitializedSnafu);
        let allocator = A::init(capacity, &self.config).inspect_err(|err| {
            warn!("{}: global init failed\n{}", A::NAME, Report::new(err));
        })?;
        *inner = Some(allocator);
        info!("{}: global arena of {capacity} bytes ready", A::NAME);
        Ok(())
    }

    fn destroy(&self) -> bool {
        let allocator = self.inner.lock().take();
        allocator.map(A::destroy).is_some()
    }

    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        let mut inner = self.inner.lock();
        let allocator = inner.as_mut().context(alloc_error::UninitializedSnafu)?;
        allocator.allocate(size)
    }

    fn release(&self, block: Block) -> Result<(), ReleaseError> {
        let mut inner = self.inner.lock();
        let allocator = inner.as_mut().context(release_error::UninitializedSnafu)?;
        allocator.release(block)
    }

    fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> Option<R> {
        self.inner.lock().as_mut().map(f)
    }
}
