use core::cell::RefCell;

use log::{debug, info, warn};
use snafu::{OptionExt as _, ResultExt as _, ensure};
use snafu_utils::Report;
use spin::Once;
use thread_local::ThreadLocal;

use super::SharedArena;
use crate::{
    AllocError, ArenaAllocator, Block, InitError, ReleaseError, alloc_error, init_error,
    release_error,
};

/// One allocator instance per thread, with no lock and no sharing.
///
/// Every handle owns its own per-thread instances; two handles never see
/// each other's arenas, even on the same thread. A thread gets its instance
/// from an explicit [`init`](SharedArena::init) or, once any thread has
/// initialized the handle successfully, lazily on its first `allocate` with
/// the same capacity. Instances are dropped together with the handle.
///
/// Blocks belong to the thread that allocated them. Releasing a block on
/// another thread is a caller error: it fails with
/// [`ReleaseError::InvalidRelease`] when the other instance has no matching
/// live block, and corrupts that instance's state otherwise. Thread ids are
/// recycled, so a thread started after another one exited may pick up the
/// instance that thread left behind.
///
/// ```
/// use std::thread;
///
/// use arena_alloc::{
///     SplitConfig,
///     splitting::SplittingAllocator,
///     sync::{SharedArena as _, ThreadLocalArena},
/// };
///
/// let arena = ThreadLocalArena::<SplittingAllocator>::new(SplitConfig);
/// arena.init(4096).unwrap();
///
/// thread::scope(|s| {
///     s.spawn(|| {
///         // lazily creates this thread's own arena
///         let block = arena.allocate(64).unwrap();
///         arena.release(block).unwrap();
///     });
/// });
/// ```
pub struct ThreadLocalArena<A>
where
    A: ArenaAllocator,
{
    config: A::Config,
    capacity: Once<usize>,
    instances: ThreadLocal<RefCell<Option<A>>>,
}

impl<A> Default for ThreadLocalArena<A>
where
    A: ArenaAllocator,
{
    fn default() -> Self {
        Self::new(A::Config::default())
    }
}

impl<A> ThreadLocalArena<A>
where
    A: ArenaAllocator,
{
    #[must_use]
    pub fn new(config: A::Config) -> Self {
        Self {
            config,
            capacity: Once::new(),
            instances: ThreadLocal::new(),
        }
    }

    /// Capacity used for lazily created instances.
    ///
    /// Recorded by the first successful [`init`](SharedArena::init).
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.get().copied()
    }

    /// Whether the calling thread has an instance.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.instances
            .get()
            .is_some_and(|slot| slot.borrow().is_some())
    }

    fn instance<R>(&self, f: impl FnOnce(&mut Option<A>) -> R) -> R {
        let slot = self.instances.get_or(|| RefCell::new(None));
        f(&mut slot.borrow_mut())
    }
}

impl<A> SharedArena for ThreadLocalArena<A>
where
    A: ArenaAllocator,
{
    type Allocator = A;

    fn init(&self, capacity: usize) -> Result<(), InitError> {
        self.instance(|slot| {
            ensure!(slot.is_none(), init_error::AlreadyInitializedSnafu);
            let allocator = A::init(capacity, &self.config).inspect_err(|err| {
                warn!("{}: thread-local init failed\n{}", A::NAME, Report::new(err));
            })?;
            *slot = Some(allocator);
            self.capacity.call_once(|| capacity);
            info!("{}: thread-local arena of {capacity} bytes ready", A::NAME);
            Ok(())
        })
    }

    fn destroy(&self) -> bool {
        let allocator = self
            .instances
            .get()
            .and_then(|slot| slot.borrow_mut().take());
        allocator.map(A::destroy).is_some()
    }

    fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        self.instance(|slot| {
            if slot.is_none() {
                let capacity = self.capacity().context(alloc_error::UninitializedSnafu)?;
                let allocator =
                    A::init(capacity, &self.config).context(alloc_error::LazyInitSnafu)?;
                debug!("{}: lazily created thread-local arena", A::NAME);
                *slot = Some(allocator);
            }
            let Some(allocator) = slot.as_mut() else {
                unreachable!("thread-local slot was just filled");
            };
            allocator.allocate(size)
        })
    }

    fn release(&self, block: Block) -> Result<(), ReleaseError> {
        let slot = self
            .instances
            .get()
            .context(release_error::UninitializedSnafu)?;
        let mut slot = slot.borrow_mut();
        let allocator = slot.as_mut().context(release_error::UninitializedSnafu)?;
        allocator.release(block)
    }

    fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> Option<R> {
        let slot = self.instances.get()?;
        slot.borrow_mut().as_mut().map(f)
    }
}
