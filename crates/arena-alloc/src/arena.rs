//! The byte region every allocator instance manages.
//!
//! Offsets handed out by the allocators are relative to the arena base, so
//! the base is always `0` and the bound is the capacity.

use core::ops::Range;

use snafu::ResultExt as _;

use crate::{InitError, init_error};

/// Exclusively owned, zero-initialized byte buffer of a fixed capacity.
pub struct Arena {
    buf: Box<[u8]>,
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

impl Arena {
    /// Reserves `capacity` bytes from the system allocator.
    ///
    /// Reservation failure is reported instead of aborting the process.
    pub fn new(capacity: usize) -> Result<Self, InitError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .context(init_error::ArenaAllocSnafu { capacity })?;
        buf.resize(capacity, 0);
        Ok(Self {
            buf: buf.into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub const fn base(&self) -> usize {
        0
    }

    /// One past the last valid offset.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn contains(&self, range: &Range<usize>) -> bool {
        range.start <= range.end && range.end <= self.bound()
    }

    #[must_use]
    pub fn bytes(&self, range: Range<usize>) -> Option<&[u8]> {
        self.buf.get(range)
    }

    pub fn bytes_mut(&mut self, range: Range<usize>) -> Option<&mut [u8]> {
        self.buf.get_mut(range)
    }
}
