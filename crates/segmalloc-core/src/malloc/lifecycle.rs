//! Structured allocator lifecycle records.
//!
//! Every public operation leaves one or more records behind: what was asked,
//! which path served it, and a snapshot of the allocator counters at that
//! point. Callers drain them to feed their own log sinks.

/// Allocator lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AllocatorLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl AllocatorLogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Structured allocator lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this lifecycle record.
    pub trace_id: String,
    /// Severity level.
    pub level: AllocatorLogLevel,
    /// API symbol (`init`, `allocate`, `release`, `reallocate`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `extend`, `coalesce`, ...).
    pub event: &'static str,
    /// Payload offset involved in the event.
    pub ptr: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Free-list bucket involved in the event.
    pub bucket: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: allocated blocks handed out and not yet released.
    pub active_count: usize,
    /// Snapshot: current arena length.
    pub arena_bytes: usize,
    /// Snapshot: number of successful arena extensions.
    pub extensions: u64,
}

/// Monotonic counters kept alongside the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Allocated blocks handed out and not yet released.
    pub active_count: usize,
    /// Successful arena extensions (initialization included).
    pub extensions: u64,
    /// Allocations served from the free lists without growing the arena.
    pub free_list_hits: u64,
    /// Blocks split during placement.
    pub splits: u64,
    /// Merges performed by coalescing.
    pub coalesces: u64,
    /// Reallocations resolved without moving the payload.
    pub realloc_in_place: u64,
    /// Reallocations that moved the payload.
    pub realloc_moves: u64,
    /// Failed arena extensions.
    pub oom_events: u64,
}

/// Most records a `LifecycleLog` retains between drains. Past this the
/// oldest quarter is discarded; decision ids keep counting, so gaps show
/// where records were dropped.
pub const LIFECYCLE_LOG_CAPACITY: usize = 4096;

/// Record buffer with a monotonic id source.
#[derive(Debug)]
pub(crate) struct LifecycleLog {
    enabled: bool,
    next_decision_id: u64,
    records: Vec<AllocatorLogRecord>,
}

/// Fields of a record that vary per call site.
pub(crate) struct Event {
    pub level: AllocatorLogLevel,
    pub symbol: &'static str,
    pub event: &'static str,
    pub ptr: Option<usize>,
    pub size: Option<usize>,
    pub bucket: Option<usize>,
    pub outcome: &'static str,
}

impl LifecycleLog {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            next_decision_id: 1,
            records: Vec::new(),
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn push(
        &mut self,
        event: Event,
        details: impl Into<String>,
        stats: &AllocatorStats,
        arena_bytes: usize,
    ) {
        if !self.enabled {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        let trace_id = format!("segmalloc::{}::{:016x}", event.symbol, decision_id);
        if self.records.len() >= LIFECYCLE_LOG_CAPACITY {
            self.records.drain(..LIFECYCLE_LOG_CAPACITY / 4);
        }
        self.records.push(AllocatorLogRecord {
            decision_id,
            trace_id,
            level: event.level,
            symbol: event.symbol,
            event: event.event,
            ptr: event.ptr,
            size: event.size,
            bucket: event.bucket,
            outcome: event.outcome,
            details: details.into(),
            active_count: stats.active_count,
            arena_bytes,
            extensions: stats.extensions,
        });
    }

    pub(crate) fn records(&self) -> &[AllocatorLogRecord] {
        &self.records
    }

    pub(crate) fn drain(&mut self) -> Vec<AllocatorLogRecord> {
        std::mem::take(&mut self.records)
    }
}
