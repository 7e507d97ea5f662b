#![no_main]
use libfuzzer_sys::fuzz_target;

use segmalloc_core::{AllocatorConfig, SegAllocator, ValidationLevel};

// Each 4-byte chunk is one op: kind, 16-bit size, slot selector.
fuzz_target!(|data: &[u8]| {
    let config = AllocatorConfig::default()
        .with_chunk_size(256)
        .with_arena_limit(1 << 20)
        .with_validation(ValidationLevel::Full)
        .with_lifecycle_logging(false);
    let Ok(mut heap) = SegAllocator::new(config) else {
        return;
    };
    // (ptr, requested size, fill byte)
    let mut live: Vec<(usize, usize, u8)> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let size = u16::from_le_bytes([chunk[1], chunk[2]]) as usize;
        let slot = chunk[3] as usize;
        match chunk[0] % 3 {
            0 => {
                if let Some(ptr) = heap.allocate(size) {
                    let fill = chunk[3];
                    heap.payload_mut(ptr)[..size].fill(fill);
                    live.push((ptr, size, fill));
                }
            }
            1 => {
                if !live.is_empty() {
                    let (ptr, size, fill) = live.swap_remove(slot % live.len());
                    assert!(heap.payload(ptr)[..size].iter().all(|&b| b == fill));
                    heap.release(ptr);
                }
            }
            _ => {
                if !live.is_empty() {
                    let index = slot % live.len();
                    let (ptr, old_size, fill) = live[index];
                    match heap.reallocate(ptr, size) {
                        Some(new_ptr) => {
                            let kept = old_size.min(size);
                            assert!(heap.payload(new_ptr)[..kept].iter().all(|&b| b == fill));
                            heap.payload_mut(new_ptr)[..size].fill(fill);
                            live[index] = (new_ptr, size, fill);
                        }
                        None if size == 0 => {
                            live.swap_remove(index);
                        }
                        None => {
                            assert!(heap.payload(ptr)[..old_size].iter().all(|&b| b == fill));
                        }
                    }
                }
            }
        }
    }

    for (ptr, _, _) in live {
        heap.release(ptr);
    }
    let report = heap.check_heap().expect("heap consistent after fuzz sequence");
    assert_eq!(report.allocated_blocks, 0);
});
