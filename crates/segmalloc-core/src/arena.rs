//! Growable backing region for the allocator.
//!
//! The allocator sees the arena as one contiguous byte slice addressed by
//! offsets. The only way it changes shape is [`Arena::extend`], which appends
//! bytes at the end, the way `sbrk` moves a program break.

use crate::error::ArenaError;
use crate::malloc::layout::{ALIGNMENT, align_up};

/// Largest arena an allocator can address: tags and links are 32-bit words.
pub const MAX_ARENA_BYTES: usize = (u32::MAX as usize) & !(ALIGNMENT - 1);

/// Heap-extension primitive consumed by the allocator.
pub trait Arena {
    /// Resets the region to empty.
    fn initialize(&mut self);

    /// Grows the region by at least `delta` bytes and returns the offset
    /// where the new bytes start. On failure nothing changes.
    fn extend(&mut self, delta: usize) -> Result<usize, ArenaError>;

    /// Current contents.
    fn bytes(&self) -> &[u8];

    /// Current contents, mutable.
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Current length (the break).
    fn len(&self) -> usize {
        self.bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Zero-filled `Vec<u8>` arena with a byte limit.
#[derive(Debug, Clone)]
pub struct VecArena {
    bytes: Vec<u8>,
    limit: usize,
}

impl VecArena {
    /// Creates an empty arena that refuses to grow past `limit` bytes.
    ///
    /// The limit is clamped to [`MAX_ARENA_BYTES`].
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit: limit.min(MAX_ARENA_BYTES),
        }
    }

    /// Byte limit for this arena.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for VecArena {
    fn default() -> Self {
        Self::with_limit(MAX_ARENA_BYTES)
    }
}

impl Arena for VecArena {
    fn initialize(&mut self) {
        self.bytes.clear();
    }

    fn extend(&mut self, delta: usize) -> Result<usize, ArenaError> {
        let delta = align_up(delta).ok_or(ArenaError::Overflow { requested: delta })?;
        let start = self.bytes.len();
        let end = start
            .checked_add(delta)
            .ok_or(ArenaError::Overflow { requested: delta })?;
        if end > self.limit {
            return Err(ArenaError::Exhausted {
                requested: delta,
                current: start,
                limit: self.limit,
            });
        }
        self.bytes.resize(end, 0);
        Ok(start)
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
