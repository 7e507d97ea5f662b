//! Error types for the allocator, its arena and the heap checker.

use thiserror::Error;

/// Failure to grow the arena.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error("arena cannot grow by {requested} bytes (current {current}, limit {limit})")]
    Exhausted {
        requested: usize,
        current: usize,
        limit: usize,
    },
    #[error("extension of {requested} bytes overflows the address space")]
    Overflow { requested: usize },
}

/// Errors surfaced by the fallible allocator entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("out of address space: {0}")]
    OutOfAddressSpace(#[from] ArenaError),
    #[error("invalid block pointer {ptr:#x}: {reason}")]
    PreconditionViolation { ptr: usize, reason: &'static str },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Rejected allocator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("chunk size {0} must be a non-zero multiple of 8")]
    ChunkSize(usize),
    #[error("initial chunk {0} must be a multiple of 8")]
    InitialChunk(usize),
    #[error("arena limit {limit} is outside [{min}, {max}]")]
    ArenaLimit { limit: usize, min: usize, max: usize },
    #[error("environment variable {name} has unparsable value {value:?}")]
    Env { name: &'static str, value: String },
}

/// A heap invariant that does not hold.
///
/// These never surface from correct use of the allocator; the checker exists
/// to pin down internal bugs in tests and in `ValidationLevel::Full` runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapCheckError {
    #[error("arena of {len} bytes is too small to hold the sentinels")]
    Truncated { len: usize },
    #[error("alignment padding word is {tag:#x}, expected 0")]
    BadPadding { tag: u32 },
    #[error("bad prologue tags: header {header:#x}, footer {footer:#x}")]
    BadPrologue { header: u32, footer: u32 },
    #[error("bad epilogue at {offset:#x}: tag {tag:#x}")]
    BadEpilogue { offset: usize, tag: u32 },
    #[error("block {bp:#x}: header {header:#x} disagrees with footer {footer:#x}")]
    TagMismatch { bp: usize, header: u32, footer: u32 },
    #[error("block {bp:#x} payload is not 8-byte aligned")]
    Misaligned { bp: usize },
    #[error("block {bp:#x} has invalid size {size}")]
    BadSize { bp: usize, size: usize },
    #[error("block {bp:#x} of size {size} runs past the arena end {end:#x}")]
    OutOfBounds { bp: usize, size: usize, end: usize },
    #[error("adjacent free blocks {first:#x} and {second:#x}")]
    AdjacentFree { first: usize, second: usize },
    #[error("bucket {bucket} links block {bp:#x} which is not a free heap block")]
    ForeignLink { bucket: usize, bp: usize },
    #[error("bucket {bucket} holds allocated block {bp:#x}")]
    AllocatedInBucket { bucket: usize, bp: usize },
    #[error("block {bp:#x} of size {size} sits in bucket {bucket}, expected {expected}")]
    WrongBucket {
        bp: usize,
        size: usize,
        bucket: usize,
        expected: usize,
    },
    #[error("bucket {bucket} out of order at block {bp:#x}")]
    Unsorted { bucket: usize, bp: usize },
    #[error("block {bp:#x} back link {found:#x}, expected {expected:#x}")]
    BrokenBackLink {
        bp: usize,
        found: usize,
        expected: usize,
    },
    #[error("block {bp:#x} appears in the free lists more than once")]
    Duplicate { bp: usize },
    #[error("free block {bp:#x} is missing from the free lists")]
    Unlisted { bp: usize },
}
