//! Trace replay against `SegAllocator`.
//!
//! Every block gets an id-derived byte pattern written over its requested
//! size. The pattern is verified before the block is released or resized and
//! again for every block still live at the end, so any overlap or stray write
//! by the allocator shows up as an integrity failure.

use serde::{Deserialize, Serialize};

use segmalloc_core::malloc::layout::ALIGNMENT;
use segmalloc_core::{AllocatorConfig, SegAllocator, ValidationLevel};

use crate::error::HarnessError;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::trace::{Trace, TraceOp};

/// Knobs for one replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub config: AllocatorConfig,
    /// Run the heap checker after every op.
    pub check_each_op: bool,
}

impl ReplayOptions {
    /// Options for verification runs: target tags are checked on every call
    /// and the heap checker runs after every op, so a breach comes back as
    /// `HarnessError::HeapCheck` for the offending trace.
    #[must_use]
    pub fn verifying() -> Self {
        Self {
            config: AllocatorConfig::default()
                .with_validation(ValidationLevel::Tags)
                .with_lifecycle_logging(false),
            check_each_op: true,
        }
    }
}

/// Summary of a completed replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub trace_sha256: String,
    pub ops: usize,
    pub allocs: usize,
    pub frees: usize,
    pub reallocs: usize,
    /// Largest sum of requested sizes live at once.
    pub peak_live_bytes: usize,
    pub final_heap_bytes: usize,
    /// `peak_live_bytes / final_heap_bytes`.
    pub utilization: f64,
    pub extensions: u64,
    pub free_list_hits: u64,
    pub splits: u64,
    pub coalesces: u64,
    pub realloc_in_place: u64,
    pub realloc_moves: u64,
    pub oom_events: u64,
    pub heap_checks: usize,
}

impl ReplayReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveBlock {
    ptr: usize,
    size: usize,
}

/// Replays `trace`, optionally streaming allocator records and replay
/// milestones to `log`.
pub fn replay(
    trace: &Trace,
    options: &ReplayOptions,
    mut log: Option<&mut LogEmitter>,
) -> Result<ReplayReport, HarnessError> {
    let mut heap = SegAllocator::new(options.config.clone())
        .map_err(|source| HarnessError::Alloc { op: 0, source })?;
    let digest = trace.digest();

    if let Some(log) = log.as_deref_mut() {
        log.emit_entry(
            LogEntry::new("", LogLevel::Info, "replay_start").with_details(serde_json::json!({
                "trace_sha256": digest,
                "ops": trace.ops.len(),
                "ids": trace.num_ids,
                "validation": format!("{:?}", options.config.validation),
            })),
        )?;
    }

    let mut slots: Vec<Option<LiveBlock>> = vec![None; trace.num_ids];
    let mut report = ReplayReport {
        trace_sha256: digest,
        ops: trace.ops.len(),
        allocs: 0,
        frees: 0,
        reallocs: 0,
        peak_live_bytes: 0,
        final_heap_bytes: 0,
        utilization: 0.0,
        extensions: 0,
        free_list_hits: 0,
        splits: 0,
        coalesces: 0,
        realloc_in_place: 0,
        realloc_moves: 0,
        oom_events: 0,
        heap_checks: 0,
    };
    let mut live_bytes = 0usize;

    let result = (|| -> Result<(), HarnessError> {
        for (op_index, op) in trace.ops.iter().enumerate() {
            match *op {
                TraceOp::Alloc { id, size } => {
                    if slots[id].is_some() {
                        return Err(integrity(op_index, id, "allocation of an id that is live"));
                    }
                    let ptr = heap
                        .try_allocate(size)
                        .map_err(|source| HarnessError::Alloc { op: op_index, source })?
                        .unwrap_or(0);
                    check_block(&heap, op_index, id, ptr, size)?;
                    fill(&mut heap, ptr, id, size);
                    slots[id] = Some(LiveBlock { ptr, size });
                    live_bytes += size;
                    report.allocs += 1;
                }
                TraceOp::Free { id } => {
                    let Some(block) = slots[id].take() else {
                        return Err(integrity(op_index, id, "release of an id that is not live"));
                    };
                    verify(&heap, op_index, id, block.ptr, block.size)?;
                    heap.try_release(block.ptr)
                        .map_err(|source| HarnessError::Alloc { op: op_index, source })?;
                    live_bytes -= block.size;
                    report.frees += 1;
                }
                TraceOp::Realloc { id, size } => {
                    let old = slots[id].unwrap_or(LiveBlock { ptr: 0, size: 0 });
                    verify(&heap, op_index, id, old.ptr, old.size)?;
                    let ptr = heap
                        .try_reallocate(old.ptr, size)
                        .map_err(|source| HarnessError::Alloc { op: op_index, source })?
                        .unwrap_or(0);
                    check_block(&heap, op_index, id, ptr, size)?;
                    verify(&heap, op_index, id, ptr, old.size.min(size))?;
                    fill(&mut heap, ptr, id, size);
                    slots[id] = (size > 0).then_some(LiveBlock { ptr, size });
                    live_bytes = live_bytes - old.size + size;
                    report.reallocs += 1;
                }
            }
            report.peak_live_bytes = report.peak_live_bytes.max(live_bytes);

            if options.check_each_op {
                heap.check_heap()
                    .map_err(|source| HarnessError::HeapCheck { op: op_index, source })?;
                report.heap_checks += 1;
            }
            let records = heap.drain_lifecycle_logs();
            if let Some(log) = log.as_deref_mut() {
                for record in records {
                    log.emit_entry(LogEntry::from_allocator_record(&record).with_op_index(op_index))?;
                }
            }
        }

        for (id, block) in slots.iter().enumerate() {
            if let Some(block) = block {
                verify(&heap, trace.ops.len(), id, block.ptr, block.size)?;
            }
        }
        heap.check_heap().map_err(|source| HarnessError::HeapCheck {
            op: trace.ops.len(),
            source,
        })?;
        report.heap_checks += 1;
        Ok(())
    })();

    let stats = heap.stats();
    report.final_heap_bytes = heap.heap_size();
    report.utilization = if report.final_heap_bytes == 0 {
        0.0
    } else {
        report.peak_live_bytes as f64 / report.final_heap_bytes as f64
    };
    report.extensions = stats.extensions;
    report.free_list_hits = stats.free_list_hits;
    report.splits = stats.splits;
    report.coalesces = stats.coalesces;
    report.realloc_in_place = stats.realloc_in_place;
    report.realloc_moves = stats.realloc_moves;
    report.oom_events = stats.oom_events;

    if let Some(log) = log {
        let (level, outcome, details) = match &result {
            Ok(()) => (
                LogLevel::Info,
                Outcome::Pass,
                serde_json::to_value(&report)?,
            ),
            Err(err) => (
                LogLevel::Error,
                Outcome::Fail,
                serde_json::json!({ "error": err.to_string() }),
            ),
        };
        log.emit_entry(
            LogEntry::new("", level, "replay_end")
                .with_outcome(outcome)
                .with_details(details),
        )?;
        log.flush()?;
    }

    result.map(|()| report)
}

fn integrity(op: usize, id: usize, message: impl Into<String>) -> HarnessError {
    HarnessError::Integrity {
        op,
        id,
        message: message.into(),
    }
}

fn pattern_byte(id: usize, index: usize) -> u8 {
    let seed = (id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    ((seed >> 56) as u8) ^ (index as u8).wrapping_mul(31)
}

/// Checks that a block returned for a `size`-byte request is usable.
fn check_block(
    heap: &SegAllocator,
    op: usize,
    id: usize,
    ptr: usize,
    size: usize,
) -> Result<(), HarnessError> {
    if size == 0 {
        return if ptr == 0 {
            Ok(())
        } else {
            Err(integrity(op, id, "zero-size request returned a block"))
        };
    }
    if ptr == 0 {
        return Err(integrity(op, id, "allocator returned null"));
    }
    if ptr % ALIGNMENT != 0 {
        return Err(integrity(op, id, format!("payload {ptr:#x} is misaligned")));
    }
    let usable = heap.usable_size(ptr);
    if usable < size {
        return Err(integrity(
            op,
            id,
            format!("payload {ptr:#x} holds {usable} bytes, {size} requested"),
        ));
    }
    Ok(())
}

fn fill(heap: &mut SegAllocator, ptr: usize, id: usize, size: usize) {
    if size == 0 {
        return;
    }
    for (index, byte) in heap.payload_mut(ptr)[..size].iter_mut().enumerate() {
        *byte = pattern_byte(id, index);
    }
}

fn verify(
    heap: &SegAllocator,
    op: usize,
    id: usize,
    ptr: usize,
    size: usize,
) -> Result<(), HarnessError> {
    if size == 0 {
        return Ok(());
    }
    let payload = &heap.payload(ptr)[..size];
    match payload
        .iter()
        .enumerate()
        .find(|&(index, &byte)| byte != pattern_byte(id, index))
    {
        None => Ok(()),
        Some((index, &byte)) => Err(integrity(
            op,
            id,
            format!(
                "payload {ptr:#x} byte {index} is {byte:#04x}, expected {:#04x}",
                pattern_byte(id, index)
            ),
        )),
    }
}
