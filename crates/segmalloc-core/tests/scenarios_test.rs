//! Integration test: allocator behavior scenarios.
//!
//! Exercises the public API of `SegAllocator` end to end: reuse of freed
//! blocks, coalescing with trailing free space, steady-state loops, and the
//! null/zero conventions of allocate/release/reallocate.
//!
//! Run: cargo test -p segmalloc-core --test scenarios_test

use segmalloc_core::malloc::layout::OVERHEAD;
use segmalloc_core::{AllocatorConfig, LIFECYCLE_LOG_CAPACITY, SegAllocator, ValidationLevel};

fn allocator() -> SegAllocator {
    SegAllocator::new(AllocatorConfig::default().with_validation(ValidationLevel::Full))
        .expect("default config is valid")
}

// ---------------------------------------------------------------------------
// 1. Reuse and coalescing
// ---------------------------------------------------------------------------

#[test]
fn reuse_then_coalesce_with_trailing_space() {
    let mut heap = allocator();

    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(200).unwrap();
    assert!(b >= a + 100 + OVERHEAD);

    heap.release(a);
    let high_water = heap.heap_size();
    assert_eq!(heap.allocate(90), Some(a));
    assert_eq!(heap.heap_size(), high_water);

    heap.release(b);
    // B merged with the trailing free space; A is still live.
    assert_eq!(heap.free_block_count(), 1);
    let c = heap.allocate(290).unwrap();
    assert_eq!(c, b);
    assert!(heap.usable_size(c) >= 290);
    assert_eq!(heap.heap_size(), high_water);
    assert!(heap.check_heap().is_ok());
}

#[test]
fn release_everything_leaves_one_free_block() {
    let mut heap = allocator();
    let ptrs: Vec<usize> = (1..=50).map(|i| heap.allocate(i * 13).unwrap()).collect();
    // Release in an interleaved order to hit every coalesce shape.
    for &ptr in ptrs.iter().step_by(2) {
        heap.release(ptr);
    }
    for &ptr in ptrs.iter().skip(1).step_by(2) {
        heap.release(ptr);
    }
    let report = heap.check_heap().unwrap();
    assert_eq!(report.allocated_blocks, 0);
    assert_eq!(report.free_blocks, 1);
    assert_eq!(heap.free_block_count(), 1);
}

// ---------------------------------------------------------------------------
// 2. Steady state
// ---------------------------------------------------------------------------

#[test]
fn steady_state_loop_does_not_grow_arena() {
    let mut heap = allocator();
    let first = heap.allocate(100).unwrap();
    heap.release(first);
    let after_first_extension = heap.heap_size();
    let extensions = heap.stats().extensions;

    for _ in 0..10_000 {
        let ptr = heap.allocate(100).unwrap();
        assert_eq!(ptr, first);
        heap.release(ptr);
    }

    assert_eq!(heap.heap_size(), after_first_extension);
    assert_eq!(heap.stats().extensions, extensions);
    assert_eq!(heap.stats().active_count, 0);
}

#[test]
fn steady_state_loop_with_several_sizes() {
    let mut heap =
        SegAllocator::new(AllocatorConfig::default().with_lifecycle_logging(false)).unwrap();
    let sizes = [24, 100, 512, 3000];
    for &size in &sizes {
        let ptr = heap.allocate(size).unwrap();
        heap.release(ptr);
    }
    let high_water = heap.heap_size();
    for i in 0..10_000 {
        let ptr = heap.allocate(sizes[i % sizes.len()]).unwrap();
        heap.release(ptr);
    }
    assert_eq!(heap.heap_size(), high_water);
}

// ---------------------------------------------------------------------------
// 3. Null and zero conventions
// ---------------------------------------------------------------------------

#[test]
fn null_and_zero_conventions() {
    let mut heap = allocator();
    assert_eq!(heap.allocate(0), None);
    heap.release(0);

    let ptr = heap.reallocate(0, 48).unwrap();
    assert!(heap.usable_size(ptr) >= 48);

    assert_eq!(heap.reallocate(ptr, 0), None);
    assert_eq!(heap.stats().active_count, 0);
    assert_eq!(heap.check_heap().unwrap().allocated_blocks, 0);
}

// ---------------------------------------------------------------------------
// 4. Reallocation keeps data
// ---------------------------------------------------------------------------

#[test]
fn reallocate_preserves_prefix_across_every_path() {
    let mut heap = allocator();
    let mut ptr = heap.allocate(40).unwrap();
    let pattern: Vec<u8> = (0..40u8).map(|b| b.wrapping_mul(7)).collect();
    heap.payload_mut(ptr)[..40].copy_from_slice(&pattern);

    // Pin a neighbor so later growth has to move.
    let blocker = heap.allocate(16).unwrap();

    for size in [64, 300, 20, 1000, 5000, 40_000] {
        ptr = heap.reallocate(ptr, size).unwrap();
        assert!(heap.usable_size(ptr) >= size);
        let keep = size.min(40);
        assert_eq!(&heap.payload(ptr)[..keep], &pattern[..keep]);
        heap.check_heap().unwrap();
    }

    heap.release(blocker);
    heap.release(ptr);
    assert_eq!(heap.check_heap().unwrap().allocated_blocks, 0);
}

#[test]
fn shrinking_never_moves() {
    let mut heap = allocator();
    let ptr = heap.allocate(1000).unwrap();
    for size in (1..1000).rev().step_by(97) {
        assert_eq!(heap.reallocate(ptr, size), Some(ptr));
    }
}

// ---------------------------------------------------------------------------
// 5. Exhaustion
// ---------------------------------------------------------------------------

#[test]
fn exhaustion_is_recoverable() {
    let mut heap = SegAllocator::new(
        AllocatorConfig::default()
            .with_chunk_size(512)
            .with_arena_limit(8192)
            .with_validation(ValidationLevel::Full),
    )
    .unwrap();

    let mut live = Vec::new();
    while let Some(ptr) = heap.allocate(500) {
        live.push(ptr);
    }
    assert!(!live.is_empty());
    assert!(heap.heap_size() <= 8192);
    assert!(heap.stats().oom_events >= 1);
    heap.check_heap().unwrap();

    for ptr in live.drain(..) {
        heap.release(ptr);
    }
    assert!(heap.allocate(500).is_some());
}

// ---------------------------------------------------------------------------
// 6. Long-lived allocators
// ---------------------------------------------------------------------------

#[test]
fn default_config_log_stays_bounded_without_draining() {
    let mut heap = SegAllocator::new(AllocatorConfig::default()).unwrap();
    assert!(heap.config().lifecycle_logging);

    for _ in 0..10_000 {
        let ptr = heap.allocate(100).unwrap();
        heap.release(ptr);
    }
    let retained = heap.lifecycle_logs().len();
    assert!(retained <= LIFECYCLE_LOG_CAPACITY);

    let drained = heap.drain_lifecycle_logs();
    assert_eq!(drained.len(), retained);
    assert!(drained.iter().any(|record| record.symbol == "release"));
    assert!(heap.lifecycle_logs().is_empty());
}
