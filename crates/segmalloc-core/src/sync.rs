//! Shared access to one allocator from several threads.
//!
//! `SegAllocator` itself is single-threaded; this wrapper serializes every
//! call behind a `parking_lot::Mutex`.

use parking_lot::Mutex;

use crate::arena::{Arena, VecArena};
use crate::config::AllocatorConfig;
use crate::error::{AllocError, HeapCheckError};
use crate::malloc::{AllocatorLogRecord, AllocatorStats, HeapReport, SegAllocator};

/// Mutex-guarded allocator.
pub struct LockedAllocator<A: Arena = VecArena> {
    inner: Mutex<SegAllocator<A>>,
}

impl LockedAllocator<VecArena> {
    pub fn new(config: AllocatorConfig) -> Result<Self, AllocError> {
        Ok(Self::from_allocator(SegAllocator::new(config)?))
    }
}

impl<A: Arena> LockedAllocator<A> {
    #[must_use]
    pub fn from_allocator(allocator: SegAllocator<A>) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    pub fn allocate(&self, size: usize) -> Option<usize> {
        self.inner.lock().allocate(size)
    }

    pub fn release(&self, ptr: usize) {
        self.inner.lock().release(ptr);
    }

    pub fn reallocate(&self, ptr: usize, size: usize) -> Option<usize> {
        self.inner.lock().reallocate(ptr, size)
    }

    /// Copies `data` into the block at `ptr`, truncated to its usable size.
    /// Returns the number of bytes written.
    pub fn write(&self, ptr: usize, data: &[u8]) -> usize {
        let mut heap = self.inner.lock();
        let payload = heap.payload_mut(ptr);
        let n = data.len().min(payload.len());
        payload[..n].copy_from_slice(&data[..n]);
        n
    }

    /// Copies the payload of the block at `ptr` out.
    pub fn read(&self, ptr: usize) -> Vec<u8> {
        self.inner.lock().payload(ptr).to_vec()
    }

    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    pub fn check_heap(&self) -> Result<HeapReport, HeapCheckError> {
        self.inner.lock().check_heap()
    }

    pub fn drain_lifecycle_logs(&self) -> Vec<AllocatorLogRecord> {
        self.inner.lock().drain_lifecycle_logs()
    }

    /// Runs `f` with exclusive access to the allocator.
    pub fn with<R>(&self, f: impl FnOnce(&mut SegAllocator<A>) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> SegAllocator<A> {
        self.inner.into_inner()
    }
}
