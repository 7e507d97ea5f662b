#![no_main]
use libfuzzer_sys::fuzz_target;

use segmalloc_core::{AllocatorConfig, ValidationLevel};
use segmalloc_harness::{ReplayOptions, Trace, replay};

// Arbitrary text must either fail to parse or replay without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(trace) = Trace::parse(text) else {
        return;
    };
    if trace.num_ids > 4096 || trace.ops.len() > 4096 {
        return;
    }
    let options = ReplayOptions {
        config: AllocatorConfig::default()
            .with_arena_limit(1 << 22)
            .with_validation(ValidationLevel::Tags)
            .with_lifecycle_logging(false),
        check_each_op: true,
    };
    let _ = replay(&trace, &options, None);
});
