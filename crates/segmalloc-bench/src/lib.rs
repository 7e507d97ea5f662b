//! Benchmark support for segmalloc.
//!
//! Benchmarks live in `benches/`; this crate only provides shared workloads.

use segmalloc_harness::{GenerateParams, Trace};

/// Deterministic mixed workload used by the replay benchmarks.
#[must_use]
pub fn mixed_trace(ops: usize, max_size: usize) -> Trace {
    Trace::generate(&GenerateParams {
        seed: 0x5EED,
        ops,
        ids: 512,
        max_size,
        realloc_percent: 20,
    })
}
