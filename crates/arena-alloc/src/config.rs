//! Tunables of the allocation strategies.

/// Body size of a slot when nothing else is configured.
pub const DEFAULT_SLOT_SIZE: usize = 1024;

/// Configuration of a [`FixedSlotPool`](crate::fixed_slot::FixedSlotPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPoolConfig {
    /// Body bytes of every slot. Also the largest request the pool serves.
    pub slot_size: usize,
}

impl Default for SlotPoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotPoolConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot_size: DEFAULT_SLOT_SIZE,
        }
    }

    #[must_use]
    pub const fn with_slot_size(mut self, slot_size: usize) -> Self {
        self.slot_size = slot_size;
        self
    }
}

/// Configuration of a [`SplittingAllocator`](crate::splitting::SplittingAllocator).
///
/// The splitting allocator has no tunables yet; the type keeps the
/// [`ArenaAllocator`](crate::ArenaAllocator) interface uniform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig;
