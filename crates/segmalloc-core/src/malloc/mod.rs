//! Memory allocation.
//!
//! A single-heap allocator in the classic boundary-tag style:
//! - `layout`: header/footer tag codec and block navigation
//! - `free_list`: segregated, size-ordered explicit free lists
//! - `allocator`: placement, splitting, coalescing, reallocation
//! - `check`: heap walker and invariant checker

pub mod allocator;
pub mod check;
pub mod free_list;
pub mod layout;
pub mod lifecycle;

pub use allocator::SegAllocator;
pub use check::{BlockInfo, Blocks, HeapReport};
pub use free_list::{FreeLists, NUM_BUCKETS, bucket_for};
pub use lifecycle::{AllocatorLogLevel, AllocatorLogRecord, AllocatorStats, LIFECYCLE_LOG_CAPACITY};
