//! Allocator benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use segmalloc_core::{AllocatorConfig, SegAllocator, ValidationLevel};
use segmalloc_harness::{ReplayOptions, replay};

fn quiet() -> AllocatorConfig {
    AllocatorConfig::default().with_lifecycle_logging(false)
}

fn bench_alloc_free_cycle(c: &mut Criterion) {
    let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 32768];
    let mut group = c.benchmark_group("alloc_free_cycle");

    for &size in sizes {
        group.bench_with_input(BenchmarkId::new("segmalloc", size), &size, |b, &sz| {
            let mut heap = SegAllocator::new(quiet()).unwrap();
            b.iter(|| {
                let ptr = heap.allocate(sz);
                criterion::black_box(ptr);
                if let Some(ptr) = ptr {
                    heap.release(ptr);
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &sz| {
            b.iter(|| {
                let v = vec![0u8; sz];
                criterion::black_box(v);
            });
        });
    }
    group.finish();
}

fn bench_alloc_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_burst");

    group.bench_function("1000x64B", |b| {
        b.iter(|| {
            let mut heap = SegAllocator::new(quiet()).unwrap();
            let ptrs: Vec<Option<usize>> = (0..1000).map(|_| heap.allocate(64)).collect();
            criterion::black_box(ptrs);
        });
    });

    group.bench_function("1000x64B_release_alternate", |b| {
        b.iter(|| {
            let mut heap = SegAllocator::new(quiet()).unwrap();
            let ptrs: Vec<usize> = (0..1000).filter_map(|_| heap.allocate(64)).collect();
            for ptr in ptrs.iter().step_by(2) {
                heap.release(*ptr);
            }
            criterion::black_box(heap.free_block_count());
        });
    });

    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("realloc_growth");

    group.bench_function("16B_to_64KiB_doubling", |b| {
        b.iter(|| {
            let mut heap = SegAllocator::new(quiet()).unwrap();
            let mut ptr = heap.allocate(16);
            let mut size = 16;
            while size < 1 << 16 {
                size *= 2;
                ptr = ptr.and_then(|p| heap.reallocate(p, size));
            }
            criterion::black_box(ptr);
        });
    });

    group.finish();
}

fn bench_trace_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace_replay");
    let trace = segmalloc_bench::mixed_trace(2_000, 2_048);

    for level in [ValidationLevel::Off, ValidationLevel::Tags, ValidationLevel::Full] {
        let options = ReplayOptions {
            config: quiet().with_validation(level),
            check_each_op: false,
        };
        group.bench_with_input(
            BenchmarkId::new("mixed_2000", format!("{level:?}")),
            &options,
            |b, options| {
                b.iter(|| criterion::black_box(replay(&trace, options, None).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_alloc_burst,
    bench_realloc_growth,
    bench_trace_replay
);
criterion_main!(benches);
