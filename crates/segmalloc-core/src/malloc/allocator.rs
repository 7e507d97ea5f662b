//! Core allocator state.
//!
//! `SegAllocator` owns the arena and the segregated free lists and implements
//! allocation policy on top of them: free-list search, arena extension,
//! splitting on placement, immediate coalescing on release, and in-place
//! growth for reallocation. Pointers handed out are payload offsets into the
//! arena; offset 0 plays the role of the null pointer.

use super::check::{self, Blocks, HeapReport};
use super::free_list::{FreeLists, bucket_for};
use super::layout::{
    self, ALIGNMENT, MIN_BLOCK_SIZE, OVERHEAD, PROLOGUE_BP, PROLOGUE_SIZE, SENTINEL_BYTES,
};
use super::lifecycle::{AllocatorLogLevel, AllocatorLogRecord, AllocatorStats, Event, LifecycleLog};
use crate::arena::{Arena, VecArena};
use crate::config::AllocatorConfig;
use crate::error::{AllocError, ArenaError, HeapCheckError};

/// Boundary-tagged allocator with segregated free lists.
pub struct SegAllocator<A: Arena = VecArena> {
    /// Backing region; grows only at the end.
    arena: A,
    /// Bucket heads for the free blocks.
    free_lists: FreeLists,
    config: AllocatorConfig,
    /// Payload offset of the prologue sentinel.
    prologue: usize,
    stats: AllocatorStats,
    log: LifecycleLog,
}

impl SegAllocator<VecArena> {
    /// Creates an allocator over a fresh `VecArena` bounded by
    /// `config.arena_limit`.
    pub fn new(config: AllocatorConfig) -> Result<Self, AllocError> {
        config.validate()?;
        let arena = VecArena::with_limit(config.arena_limit);
        Self::with_arena(arena, config)
    }
}

impl<A: Arena> SegAllocator<A> {
    /// Creates an allocator over `arena`, initializing it.
    pub fn with_arena(arena: A, config: AllocatorConfig) -> Result<Self, AllocError> {
        config.validate()?;
        let log = LifecycleLog::new(config.lifecycle_logging);
        let mut allocator = Self {
            arena,
            free_lists: FreeLists::new(),
            config,
            prologue: PROLOGUE_BP,
            stats: AllocatorStats::default(),
            log,
        };
        allocator.init()?;
        Ok(allocator)
    }

    /// Discards every block and rebuilds the sentinels and the initial chunk.
    ///
    /// All previously returned pointers become invalid.
    pub fn reset(&mut self) -> Result<(), AllocError> {
        self.init()
    }

    fn init(&mut self) -> Result<(), AllocError> {
        self.arena.initialize();
        self.free_lists.clear();
        self.stats = AllocatorStats::default();

        let base = match self.arena.extend(SENTINEL_BYTES) {
            Ok(base) => base,
            Err(err) => {
                self.stats.oom_events += 1;
                self.record(
                    Event {
                        level: AllocatorLogLevel::Error,
                        symbol: "init",
                        event: "sentinel_extend_failed",
                        ptr: None,
                        size: Some(SENTINEL_BYTES),
                        bucket: None,
                        outcome: "oom",
                    },
                    err.to_string(),
                );
                return Err(err.into());
            }
        };
        self.stats.extensions += 1;
        self.prologue = base + PROLOGUE_BP;

        let heap = self.arena.bytes_mut();
        layout::write_word(heap, base, 0);
        layout::write_word(heap, base + layout::WORD_SIZE, layout::pack(PROLOGUE_SIZE, true));
        layout::write_word(
            heap,
            base + 2 * layout::WORD_SIZE,
            layout::pack(PROLOGUE_SIZE, true),
        );
        layout::set_epilogue(heap, base + SENTINEL_BYTES);

        if self.config.initial_chunk > 0 {
            self.extend_heap("init", self.config.initial_chunk)?;
        }

        self.record(
            Event {
                level: AllocatorLogLevel::Info,
                symbol: "init",
                event: "initialized",
                ptr: Some(self.prologue),
                size: Some(self.arena.len()),
                bucket: None,
                outcome: "success",
            },
            format!(
                "chunk_size={} initial_chunk={} arena_limit={} validation={:?}",
                self.config.chunk_size,
                self.config.initial_chunk,
                self.config.arena_limit,
                self.config.validation
            ),
        );
        self.after_mutation("init");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Allocates `size` bytes and returns the payload offset.
    ///
    /// Returns `None` for `size == 0` and when the arena cannot grow.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        self.try_allocate(size).ok().flatten()
    }

    /// Fallible form of [`SegAllocator::allocate`].
    ///
    /// `Ok(None)` is the zero-size no-op; arena exhaustion is an error.
    pub fn try_allocate(&mut self, size: usize) -> Result<Option<usize>, AllocError> {
        if size == 0 {
            self.record(
                Event {
                    level: AllocatorLogLevel::Trace,
                    symbol: "allocate",
                    event: "alloc_zero",
                    ptr: None,
                    size: Some(0),
                    bucket: None,
                    outcome: "noop",
                },
                "zero_size_request",
            );
            return Ok(None);
        }

        let asize = self.block_size_for("allocate", size)?;

        let (bp, path) = match self.free_lists.find_fit(self.arena.bytes(), asize) {
            Some(bp) => {
                self.stats.free_list_hits += 1;
                (bp, "free_list")
            }
            None => {
                let grow = asize.max(self.config.chunk_size);
                (self.extend_heap("allocate", grow)?, "extend")
            }
        };

        let bp = self.place(bp, asize);
        self.stats.active_count += 1;
        self.record(
            Event {
                level: AllocatorLogLevel::Trace,
                symbol: "allocate",
                event: "alloc",
                ptr: Some(bp),
                size: Some(size),
                bucket: Some(bucket_for(asize)),
                outcome: "success",
            },
            format!(
                "path={} block_size={}",
                path,
                layout::block_size(self.arena.bytes(), bp)
            ),
        );
        self.after_mutation("allocate");
        Ok(Some(bp))
    }

    /// Releases the block at `ptr`. `0` is a no-op.
    ///
    /// `ptr` must come from this allocator and not have been released yet.
    /// With validation enabled a bad target is refused and logged; without
    /// it the heap is corrupted.
    pub fn release(&mut self, ptr: usize) {
        let _ = self.try_release(ptr);
    }

    /// Fallible form of [`SegAllocator::release`].
    pub fn try_release(&mut self, ptr: usize) -> Result<(), AllocError> {
        if ptr == 0 {
            self.record(
                Event {
                    level: AllocatorLogLevel::Trace,
                    symbol: "release",
                    event: "free_null",
                    ptr: Some(0),
                    size: None,
                    bucket: None,
                    outcome: "noop",
                },
                "null_pointer",
            );
            return Ok(());
        }
        self.validate_target("release", ptr)?;

        let size = layout::block_size(self.arena.bytes(), ptr);
        let merged = self.free_block(ptr);
        self.stats.active_count = self.stats.active_count.saturating_sub(1);
        self.record(
            Event {
                level: AllocatorLogLevel::Trace,
                symbol: "release",
                event: "free",
                ptr: Some(ptr),
                size: Some(size),
                bucket: Some(bucket_for(size)),
                outcome: "success",
            },
            format!(
                "merged_into={:#x} merged_size={}",
                merged,
                layout::block_size(self.arena.bytes(), merged)
            ),
        );
        self.after_mutation("release");
        Ok(())
    }

    /// Resizes the block at `ptr` to hold `size` bytes.
    ///
    /// `reallocate(0, n)` allocates; `reallocate(p, 0)` releases and returns
    /// `None`. On failure `None` is returned and `ptr` is left untouched.
    pub fn reallocate(&mut self, ptr: usize, size: usize) -> Option<usize> {
        self.try_reallocate(ptr, size).ok().flatten()
    }

    /// Fallible form of [`SegAllocator::reallocate`].
    pub fn try_reallocate(&mut self, ptr: usize, size: usize) -> Result<Option<usize>, AllocError> {
        if ptr == 0 {
            return self.try_allocate(size);
        }
        if size == 0 {
            self.try_release(ptr)?;
            self.record(
                Event {
                    level: AllocatorLogLevel::Trace,
                    symbol: "reallocate",
                    event: "realloc_zero",
                    ptr: Some(ptr),
                    size: Some(0),
                    bucket: None,
                    outcome: "released",
                },
                "zero_size_releases",
            );
            return Ok(None);
        }
        self.validate_target("reallocate", ptr)?;

        let asize = self.block_size_for("reallocate", size)?;
        let current = layout::block_size(self.arena.bytes(), ptr);

        if asize <= current {
            return Ok(Some(self.finish_in_place(ptr, size, "realloc_fits", current)));
        }

        let next = layout::next_block(self.arena.bytes(), ptr);
        let next_size = layout::block_size(self.arena.bytes(), next);

        // Last block in the arena: grow the arena and absorb the new space.
        if next_size == 0 {
            let grow = (asize - current).max(self.config.chunk_size);
            let fresh = self.extend_heap("reallocate", grow)?;
            let heap = self.arena.bytes_mut();
            let fresh_size = layout::block_size(heap, fresh);
            self.free_lists.remove(heap, fresh);
            layout::set_block(heap, ptr, current + fresh_size, true);
            return Ok(Some(self.finish_in_place(ptr, size, "realloc_extend", current)));
        }

        // Free neighbor with enough room: absorb it.
        if !layout::is_allocated(self.arena.bytes(), next) && current + next_size >= asize {
            let heap = self.arena.bytes_mut();
            self.free_lists.remove(heap, next);
            layout::set_block(heap, ptr, current + next_size, true);
            return Ok(Some(self.finish_in_place(ptr, size, "realloc_absorb_next", current)));
        }

        // Move. The old block stays live until the new one exists.
        let new_ptr = match self.try_allocate(size) {
            Ok(Some(new_ptr)) => new_ptr,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.record(
                    Event {
                        level: AllocatorLogLevel::Warn,
                        symbol: "reallocate",
                        event: "realloc_allocate_new_failed",
                        ptr: Some(ptr),
                        size: Some(size),
                        bucket: Some(bucket_for(asize)),
                        outcome: "oom",
                    },
                    format!("old_size={current} error={err}"),
                );
                return Err(err);
            }
        };

        let heap = self.arena.bytes_mut();
        let new_usable = layout::block_size(heap, new_ptr) - OVERHEAD;
        let copied = (current - OVERHEAD).min(new_usable);
        heap.copy_within(ptr..ptr + copied, new_ptr);
        self.free_block(ptr);
        self.stats.active_count = self.stats.active_count.saturating_sub(1);
        self.stats.realloc_moves += 1;
        self.record(
            Event {
                level: AllocatorLogLevel::Trace,
                symbol: "reallocate",
                event: "realloc_move",
                ptr: Some(new_ptr),
                size: Some(size),
                bucket: Some(bucket_for(asize)),
                outcome: "success",
            },
            format!("old_ptr={ptr:#x} old_size={current} copied={copied}"),
        );
        self.after_mutation("reallocate");
        Ok(Some(new_ptr))
    }

    // -----------------------------------------------------------------------
    // Payload access and introspection
    // -----------------------------------------------------------------------

    /// Usable payload bytes of the live block at `ptr`.
    #[must_use]
    pub fn usable_size(&self, ptr: usize) -> usize {
        layout::block_size(self.arena.bytes(), ptr) - OVERHEAD
    }

    /// Payload of the live block at `ptr`.
    #[must_use]
    pub fn payload(&self, ptr: usize) -> &[u8] {
        let len = self.usable_size(ptr);
        &self.arena.bytes()[ptr..ptr + len]
    }

    /// Mutable payload of the live block at `ptr`.
    pub fn payload_mut(&mut self, ptr: usize) -> &mut [u8] {
        let len = self.usable_size(ptr);
        &mut self.arena.bytes_mut()[ptr..ptr + len]
    }

    /// Current arena length in bytes. The arena never shrinks, so this is
    /// also the high-water mark.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn stats(&self) -> AllocatorStats {
        self.stats
    }

    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Number of blocks currently linked into the free lists.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.free_lists.len(self.arena.bytes())
    }

    /// Walks every block from the first real block up to the epilogue.
    pub fn blocks(&self) -> Blocks<'_> {
        check::walk_blocks(self.arena.bytes(), self.prologue)
    }

    /// Verifies every heap invariant and summarizes the heap.
    pub fn check_heap(&self) -> Result<HeapReport, HeapCheckError> {
        check::check_heap(self.arena.bytes(), &self.free_lists, self.prologue)
    }

    /// Returns a view of allocator lifecycle log records.
    pub fn lifecycle_logs(&self) -> &[AllocatorLogRecord] {
        self.log.records()
    }

    /// Drains allocator lifecycle log records.
    pub fn drain_lifecycle_logs(&mut self) -> Vec<AllocatorLogRecord> {
        self.log.drain()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Block size for a `size`-byte request; overflow counts as exhaustion.
    fn block_size_for(&mut self, symbol: &'static str, size: usize) -> Result<usize, AllocError> {
        match layout::adjusted_block_size(size) {
            Some(asize) => Ok(asize),
            None => {
                self.stats.oom_events += 1;
                self.record(
                    Event {
                        level: AllocatorLogLevel::Warn,
                        symbol,
                        event: "request_overflow",
                        ptr: None,
                        size: Some(size),
                        bucket: None,
                        outcome: "oom",
                    },
                    "block_size_overflows",
                );
                Err(ArenaError::Overflow { requested: size }.into())
            }
        }
    }

    /// Grows the arena by at least `size` bytes and turns the new space into
    /// a free block, coalesced with a free predecessor. Returns the block.
    fn extend_heap(&mut self, symbol: &'static str, size: usize) -> Result<usize, AllocError> {
        let request = layout::align_up(size)
            .ok_or(ArenaError::Overflow { requested: size })?
            .max(MIN_BLOCK_SIZE);
        let bp = match self.arena.extend(request) {
            Ok(bp) => bp,
            Err(err) => {
                self.stats.oom_events += 1;
                self.record(
                    Event {
                        level: AllocatorLogLevel::Warn,
                        symbol,
                        event: "extend_failed",
                        ptr: None,
                        size: Some(request),
                        bucket: None,
                        outcome: "oom",
                    },
                    err.to_string(),
                );
                return Err(err.into());
            }
        };
        self.stats.extensions += 1;

        // The old epilogue header becomes the new block's header.
        let grown = self.arena.len() - bp;
        let heap = self.arena.bytes_mut();
        layout::set_block(heap, bp, grown, false);
        layout::set_epilogue(heap, bp + grown);
        self.free_lists.insert(heap, bp);

        self.record(
            Event {
                level: AllocatorLogLevel::Debug,
                symbol,
                event: "extend",
                ptr: Some(bp),
                size: Some(grown),
                bucket: Some(bucket_for(grown)),
                outcome: "success",
            },
            format!("requested={request}"),
        );
        Ok(self.coalesce(bp))
    }

    /// Marks the first `asize` bytes of free block `bp` allocated, splitting
    /// off the remainder when it can stand as a block of its own.
    fn place(&mut self, bp: usize, asize: usize) -> usize {
        let heap = self.arena.bytes_mut();
        let free_size = layout::block_size(heap, bp);
        let remainder = free_size - asize;
        self.free_lists.remove(heap, bp);

        if remainder < MIN_BLOCK_SIZE {
            layout::set_block(heap, bp, free_size, true);
        } else {
            layout::set_block(heap, bp, asize, true);
            let rest = bp + asize;
            layout::set_block(heap, rest, remainder, false);
            self.free_lists.insert(heap, rest);
            self.stats.splits += 1;
        }
        bp
    }

    /// Marks `bp` free, links it, and merges it with free neighbors.
    fn free_block(&mut self, bp: usize) -> usize {
        let heap = self.arena.bytes_mut();
        let size = layout::block_size(heap, bp);
        layout::set_block(heap, bp, size, false);
        self.free_lists.insert(heap, bp);
        self.coalesce(bp)
    }

    /// Merges free block `bp` (already linked) with free physical neighbors
    /// and returns the surviving block.
    fn coalesce(&mut self, bp: usize) -> usize {
        let heap = self.arena.bytes_mut();
        let prev = layout::prev_block(heap, bp);
        let next = layout::next_block(heap, bp);
        let prev_allocated = layout::is_allocated(heap, prev);
        let next_allocated = layout::is_allocated(heap, next);
        let mut size = layout::block_size(heap, bp);

        let merged = match (prev_allocated, next_allocated) {
            (true, true) => return bp,
            (true, false) => {
                self.free_lists.remove(heap, bp);
                self.free_lists.remove(heap, next);
                size += layout::block_size(heap, next);
                layout::set_block(heap, bp, size, false);
                bp
            }
            (false, true) => {
                self.free_lists.remove(heap, prev);
                self.free_lists.remove(heap, bp);
                size += layout::block_size(heap, prev);
                layout::set_block(heap, prev, size, false);
                prev
            }
            (false, false) => {
                self.free_lists.remove(heap, prev);
                self.free_lists.remove(heap, bp);
                self.free_lists.remove(heap, next);
                size += layout::block_size(heap, prev) + layout::block_size(heap, next);
                layout::set_block(heap, prev, size, false);
                prev
            }
        };

        self.free_lists.insert(heap, merged);
        self.stats.coalesces += 1;
        merged
    }

    fn finish_in_place(
        &mut self,
        ptr: usize,
        size: usize,
        event: &'static str,
        old_size: usize,
    ) -> usize {
        self.stats.realloc_in_place += 1;
        let new_size = layout::block_size(self.arena.bytes(), ptr);
        self.record(
            Event {
                level: AllocatorLogLevel::Trace,
                symbol: "reallocate",
                event,
                ptr: Some(ptr),
                size: Some(size),
                bucket: Some(bucket_for(new_size)),
                outcome: "success",
            },
            format!("old_size={old_size} new_size={new_size}"),
        );
        self.after_mutation("reallocate");
        ptr
    }

    /// Rejects release/realloc targets that cannot be live blocks, when
    /// validation is on.
    fn validate_target(&mut self, symbol: &'static str, ptr: usize) -> Result<(), AllocError> {
        if !self.config.validation.checks_targets() {
            return Ok(());
        }
        let Err(reason) = self.inspect_target(ptr) else {
            return Ok(());
        };
        self.record(
            Event {
                level: AllocatorLogLevel::Error,
                symbol,
                event: "precondition_violation",
                ptr: Some(ptr),
                size: None,
                bucket: None,
                outcome: "refused",
            },
            reason,
        );
        Err(AllocError::PreconditionViolation { ptr, reason })
    }

    fn inspect_target(&self, ptr: usize) -> Result<(), &'static str> {
        let heap = self.arena.bytes();
        let first = self.prologue + PROLOGUE_SIZE;
        if ptr < first || ptr >= heap.len() {
            return Err("pointer outside the heap");
        }
        if ptr % ALIGNMENT != 0 {
            return Err("pointer is not payload-aligned");
        }
        let header = layout::read_word(heap, layout::header(ptr));
        let size = layout::tag_size(header);
        if size < MIN_BLOCK_SIZE || ptr + size > heap.len() {
            return Err("header size is corrupt");
        }
        if layout::read_word(heap, ptr + size - layout::DOUBLE_WORD) != header {
            return Err("header and footer disagree");
        }
        if !layout::tag_allocated(header) {
            return Err("block is not allocated");
        }
        Ok(())
    }

    fn after_mutation(&mut self, symbol: &'static str) {
        if !self.config.validation.checks_heap() {
            return;
        }
        if let Err(err) = self.check_heap() {
            self.record(
                Event {
                    level: AllocatorLogLevel::Error,
                    symbol,
                    event: "invariant_breach",
                    ptr: None,
                    size: None,
                    bucket: None,
                    outcome: "fatal",
                },
                err.to_string(),
            );
            panic!("heap invariant breached after {symbol}: {err}");
        }
    }

    fn record(&mut self, event: Event, details: impl Into<String>) {
        if !self.log.enabled() {
            return;
        }
        let arena_bytes = self.arena.len();
        self.log.push(event, details, &self.stats, arena_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationLevel;

    fn checked() -> SegAllocator {
        SegAllocator::new(AllocatorConfig::default().with_validation(ValidationLevel::Full))
            .unwrap()
    }

    fn small_arena(limit: usize) -> SegAllocator {
        SegAllocator::new(
            AllocatorConfig::default()
                .with_chunk_size(256)
                .with_arena_limit(limit)
                .with_validation(ValidationLevel::Full),
        )
        .unwrap()
    }

    fn corrupt_padding(heap: &mut SegAllocator) {
        layout::write_word(heap.arena.bytes_mut(), 0, 0xBAD);
    }

    #[test]
    #[should_panic(expected = "heap invariant breached after release")]
    fn test_full_validation_panics_on_breach() {
        let mut heap = checked();
        let ptr = heap.allocate(100).unwrap();
        corrupt_padding(&mut heap);
        heap.release(ptr);
    }

    #[test]
    fn test_tags_validation_leaves_breach_to_check_heap() {
        let mut heap = SegAllocator::new(
            AllocatorConfig::default().with_validation(ValidationLevel::Tags),
        )
        .unwrap();
        let ptr = heap.allocate(100).unwrap();
        corrupt_padding(&mut heap);
        heap.release(ptr);
        assert_eq!(
            heap.check_heap(),
            Err(HeapCheckError::BadPadding { tag: 0xBAD })
        );
    }

    #[test]
    fn test_new_state() {
        let heap = checked();
        assert_eq!(heap.heap_size(), SENTINEL_BYTES + 64);
        assert_eq!(heap.stats().active_count, 0);
        assert_eq!(heap.stats().extensions, 2);
        assert_eq!(heap.free_block_count(), 1);
        let report = heap.check_heap().unwrap();
        assert_eq!(report.free_blocks, 1);
        assert_eq!(report.free_bytes, 64);
    }

    #[test]
    fn test_allocate_zero_is_none() {
        let mut heap = checked();
        assert_eq!(heap.allocate(0), None);
        assert_eq!(heap.try_allocate(0), Ok(None));
        assert_eq!(heap.stats().active_count, 0);
    }

    #[test]
    fn test_allocate_from_initial_chunk() {
        let mut heap = checked();
        let ptr = heap.allocate(24).unwrap();
        assert_eq!(ptr, 16);
        assert_eq!(heap.usable_size(ptr), 24);
        // 64-byte initial block split into 32 allocated + 32 free.
        assert_eq!(heap.heap_size(), 80);
        assert_eq!(heap.stats().splits, 1);
        assert_eq!(heap.stats().free_list_hits, 1);
    }

    #[test]
    fn test_small_remainder_is_not_split() {
        let mut heap = checked();
        // 56 bytes -> 64-byte block: the whole initial chunk.
        let ptr = heap.allocate(56).unwrap();
        assert_eq!(heap.usable_size(ptr), 56);
        assert_eq!(heap.free_block_count(), 0);
        // 48 bytes -> 56-byte block; the 8-byte remainder stays attached.
        let mut heap = checked();
        let ptr = heap.allocate(48).unwrap();
        assert_eq!(heap.usable_size(ptr), 56);
        assert_eq!(heap.stats().splits, 0);
    }

    #[test]
    fn test_allocations_are_aligned_and_disjoint() {
        let mut heap = checked();
        let sizes = [1, 7, 8, 9, 33, 100, 255, 4000, 9000, 70_000];
        let mut spans = Vec::new();
        for &size in &sizes {
            let ptr = heap.allocate(size).unwrap();
            assert_eq!(ptr % ALIGNMENT, 0);
            assert!(heap.usable_size(ptr) >= size);
            spans.push((ptr, ptr + heap.usable_size(ptr)));
        }
        spans.sort_unstable();
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
        }
    }

    #[test]
    fn test_miss_extends_by_chunk_and_merges_tail() {
        let mut heap = checked();
        let a = heap.allocate(100).unwrap();
        assert_eq!(a, 16);
        // Initial 64-byte free block merged with the 4096-byte extension.
        assert_eq!(heap.heap_size(), 80 + 4096);
        assert_eq!(heap.stats().extensions, 3);
        assert_eq!(heap.stats().coalesces, 1);
        let report = heap.check_heap().unwrap();
        assert_eq!(report.free_bytes, 4160 - 112);
    }

    #[test]
    fn test_release_null_is_noop() {
        let mut heap = checked();
        heap.release(0);
        assert_eq!(heap.try_release(0), Ok(()));
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_coalesce_all_four_cases() {
        let mut heap = checked();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();
        let c = heap.allocate(100).unwrap();
        let d = heap.allocate(100).unwrap();
        let e = heap.allocate(100).unwrap();
        let base_free = heap.free_block_count();
        assert_eq!(base_free, 1);

        // prev allocated, next allocated: no merge.
        heap.release(b);
        assert_eq!(heap.free_block_count(), 2);
        // prev free (b), next allocated (d): merge into b.
        heap.release(c);
        assert_eq!(heap.free_block_count(), 2);
        assert_eq!(heap.usable_size(b), 224 - OVERHEAD);
        // prev allocated (prologue), next free (b+c): merge into a.
        heap.release(a);
        assert_eq!(heap.free_block_count(), 2);
        assert_eq!(layout::block_size(heap.arena.bytes(), a), 336);
        // e merges with the free tail; then d has free blocks on both sides.
        heap.release(e);
        assert_eq!(heap.free_block_count(), 2);
        heap.release(d);
        assert_eq!(heap.free_block_count(), 1);
        let report = heap.check_heap().unwrap();
        assert_eq!(report.allocated_blocks, 0);
        assert_eq!(report.free_bytes, heap.heap_size() - SENTINEL_BYTES);
    }

    #[test]
    fn test_reuse_after_release() {
        let mut heap = checked();
        let a = heap.allocate(100).unwrap();
        let _b = heap.allocate(200).unwrap();
        heap.release(a);
        let high_water = heap.heap_size();
        assert_eq!(heap.allocate(90), Some(a));
        assert_eq!(heap.heap_size(), high_water);
    }

    #[test]
    fn test_realloc_null_allocates() {
        let mut heap = checked();
        let ptr = heap.reallocate(0, 40).unwrap();
        assert!(heap.usable_size(ptr) >= 40);
        assert_eq!(heap.stats().active_count, 1);
    }

    #[test]
    fn test_realloc_zero_releases() {
        let mut heap = checked();
        let ptr = heap.allocate(40).unwrap();
        assert_eq!(heap.reallocate(ptr, 0), None);
        assert_eq!(heap.stats().active_count, 0);
        assert_eq!(heap.check_heap().unwrap().allocated_blocks, 0);
    }

    #[test]
    fn test_realloc_shrink_keeps_pointer() {
        let mut heap = checked();
        let ptr = heap.allocate(200).unwrap();
        let before = heap.usable_size(ptr);
        assert_eq!(heap.reallocate(ptr, 10), Some(ptr));
        assert_eq!(heap.usable_size(ptr), before);
    }

    #[test]
    fn test_realloc_grows_into_epilogue() {
        let mut heap = checked();
        let ptr = heap.allocate(56).unwrap();
        heap.payload_mut(ptr).fill(0xAB);
        assert_eq!(heap.reallocate(ptr, 200), Some(ptr));
        assert_eq!(heap.usable_size(ptr), 64 + 4096 - OVERHEAD);
        assert!(heap.payload(ptr)[..56].iter().all(|&b| b == 0xAB));
        assert_eq!(heap.free_block_count(), 0);
        assert_eq!(heap.stats().realloc_in_place, 1);
    }

    #[test]
    fn test_realloc_absorbs_free_neighbor() {
        let mut heap = checked();
        let a = heap.allocate(100).unwrap();
        let b = heap.allocate(100).unwrap();
        let _c = heap.allocate(100).unwrap();
        heap.release(b);
        let high_water = heap.heap_size();
        assert_eq!(heap.reallocate(a, 150), Some(a));
        assert_eq!(heap.usable_size(a), 224 - OVERHEAD);
        assert_eq!(heap.heap_size(), high_water);
    }

    #[test]
    fn test_realloc_move_preserves_payload() {
        let mut heap = checked();
        let a = heap.allocate(100).unwrap();
        let _b = heap.allocate(100).unwrap();
        for (i, byte) in heap.payload_mut(a).iter_mut().enumerate() {
            *byte = i as u8;
        }
        let moved = heap.reallocate(a, 300).unwrap();
        assert_ne!(moved, a);
        assert!(heap.usable_size(moved) >= 300);
        for (i, &byte) in heap.payload(moved)[..100].iter().enumerate() {
            assert_eq!(byte, i as u8);
        }
        assert_eq!(heap.stats().realloc_moves, 1);
        assert_eq!(heap.stats().active_count, 2);
    }

    #[test]
    fn test_exhaustion_leaves_heap_intact() {
        let mut heap = small_arena(1024);
        let before = heap.heap_size();
        assert_eq!(heap.allocate(2000), None);
        assert!(matches!(
            heap.try_allocate(2000),
            Err(AllocError::OutOfAddressSpace(ArenaError::Exhausted { .. }))
        ));
        assert_eq!(heap.heap_size(), before);
        assert!(heap.check_heap().is_ok());
        assert!(heap.allocate(32).is_some());
        assert_eq!(heap.stats().oom_events, 2);
    }

    #[test]
    fn test_huge_request_overflow_is_oom() {
        let mut heap = checked();
        assert!(matches!(
            heap.try_allocate(usize::MAX),
            Err(AllocError::OutOfAddressSpace(ArenaError::Overflow { .. }))
        ));
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_failed_realloc_extend_keeps_pointer_valid() {
        let mut heap = small_arena(1024);
        let ptr = heap.allocate(56).unwrap();
        heap.payload_mut(ptr).fill(0x5A);
        assert_eq!(heap.reallocate(ptr, 2000), None);
        assert!(heap.payload(ptr).iter().all(|&b| b == 0x5A));
        assert_eq!(heap.usable_size(ptr), 56);
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_failed_realloc_move_keeps_pointer_valid() {
        let mut heap = small_arena(1024);
        let a = heap.allocate(56).unwrap();
        let _b = heap.allocate(56).unwrap();
        heap.payload_mut(a).fill(0x77);
        assert!(matches!(
            heap.try_reallocate(a, 2000),
            Err(AllocError::OutOfAddressSpace(_))
        ));
        assert!(heap.payload(a).iter().all(|&b| b == 0x77));
        assert_eq!(heap.stats().active_count, 2);
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_validation_refuses_double_release() {
        let mut heap = SegAllocator::new(
            AllocatorConfig::default().with_validation(ValidationLevel::Tags),
        )
        .unwrap();
        let ptr = heap.allocate(24).unwrap();
        heap.release(ptr);
        assert_eq!(
            heap.try_release(ptr),
            Err(AllocError::PreconditionViolation {
                ptr,
                reason: "block is not allocated"
            })
        );
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_validation_refuses_foreign_pointers() {
        let mut heap = checked();
        let _ = heap.allocate(24).unwrap();
        for bad in [4, 12, 20, 1 << 20] {
            assert!(
                matches!(
                    heap.try_release(bad),
                    Err(AllocError::PreconditionViolation { .. })
                ),
                "pointer {bad:#x} should be refused"
            );
        }
        assert!(matches!(
            heap.try_reallocate(20, 64),
            Err(AllocError::PreconditionViolation { .. })
        ));
        assert_eq!(heap.stats().active_count, 1);
    }

    #[test]
    fn test_reset_discards_blocks() {
        let mut heap = checked();
        for _ in 0..10 {
            heap.allocate(500).unwrap();
        }
        heap.reset().unwrap();
        assert_eq!(heap.heap_size(), 80);
        assert_eq!(heap.stats().active_count, 0);
        assert_eq!(heap.free_block_count(), 1);
    }

    #[test]
    fn test_custom_initial_chunk() {
        let heap = SegAllocator::new(AllocatorConfig::default().with_initial_chunk(0)).unwrap();
        assert_eq!(heap.heap_size(), SENTINEL_BYTES);
        assert_eq!(heap.free_block_count(), 0);
        assert!(heap.check_heap().is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            SegAllocator::new(AllocatorConfig::default().with_chunk_size(12)),
            Err(AllocError::Config(_))
        ));
    }

    #[test]
    fn test_lifecycle_logs_include_trace_and_decision_ids() {
        let mut heap = checked();
        let ptr = heap.allocate(64).unwrap();
        heap.release(ptr);

        let logs = heap.drain_lifecycle_logs();
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|entry| entry.decision_id > 0));
        assert!(logs.iter().all(|entry| entry.trace_id.starts_with("segmalloc::")));
        assert!(logs.iter().any(|entry| entry.symbol == "init" && entry.event == "initialized"));
        assert!(
            logs.iter()
                .any(|entry| entry.level == AllocatorLogLevel::Trace && entry.event == "alloc")
        );
        assert!(
            logs.iter()
                .any(|entry| entry.level == AllocatorLogLevel::Trace && entry.event == "free")
        );
        assert!(heap.lifecycle_logs().is_empty());
    }

    #[test]
    fn test_lifecycle_logs_warn_on_oom_and_error_on_bad_target() {
        let mut heap = small_arena(1024);
        let _ = heap.allocate(4000);
        heap.release(0x18);
        let logs = heap.drain_lifecycle_logs();
        assert!(
            logs.iter().any(|entry| {
                entry.level == AllocatorLogLevel::Warn && entry.event == "extend_failed"
            }),
            "expected WARN extend_failed entry"
        );
        assert!(
            logs.iter().any(|entry| {
                entry.level == AllocatorLogLevel::Error && entry.event == "precondition_violation"
            }),
            "expected ERROR precondition_violation entry"
        );
    }

    #[test]
    fn test_logging_can_be_disabled() {
        let mut heap =
            SegAllocator::new(AllocatorConfig::default().with_lifecycle_logging(false)).unwrap();
        let ptr = heap.allocate(10).unwrap();
        heap.release(ptr);
        assert!(heap.lifecycle_logs().is_empty());
    }
}
