//! Integration test: `LockedAllocator` shared across threads.
//!
//! Run: cargo test -p segmalloc-core --test locked_allocator_test

use std::sync::Arc;
use std::thread;

use segmalloc_core::{AllocatorConfig, LockedAllocator};

#[test]
fn threads_get_disjoint_blocks() {
    let heap = Arc::new(
        LockedAllocator::new(AllocatorConfig::default().with_lifecycle_logging(false)).unwrap(),
    );

    let handles: Vec<_> = (0..4u8)
        .map(|tid| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut mine = Vec::new();
                for i in 0..200usize {
                    let size = 16 + (i * 7 + tid as usize * 11) % 300;
                    let ptr = heap.allocate(size).unwrap();
                    heap.write(ptr, &vec![tid; size]);
                    mine.push((ptr, size));
                    if i % 3 == 0 {
                        let (old, old_size) = mine.remove(0);
                        let data = heap.read(old);
                        assert!(data[..old_size].iter().all(|&b| b == tid));
                        heap.release(old);
                    }
                }
                for (ptr, size) in &mine {
                    let data = heap.read(*ptr);
                    assert!(data[..*size].iter().all(|&b| b == tid));
                }
                mine.len()
            })
        })
        .collect();

    let live: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    let report = heap.check_heap().unwrap();
    assert_eq!(report.allocated_blocks, live);
    assert_eq!(heap.stats().active_count, live);
}

#[test]
fn reallocate_through_lock_keeps_payload() {
    let heap = LockedAllocator::new(AllocatorConfig::default()).unwrap();
    let ptr = heap.allocate(32).unwrap();
    heap.write(ptr, b"0123456789abcdef0123456789abcdef");
    let _pin = heap.allocate(32).unwrap();
    let moved = heap.reallocate(ptr, 4000).unwrap();
    assert_ne!(moved, ptr);
    assert_eq!(&heap.read(moved)[..32], b"0123456789abcdef0123456789abcdef");
    assert!(
        heap.drain_lifecycle_logs()
            .iter()
            .any(|record| record.event == "realloc_move")
    );
}
