//! # segmalloc-core
//!
//! Explicit-free-list memory allocator over a growable byte arena.
//!
//! Blocks carry 4-byte boundary tags at both ends, free blocks are indexed
//! by size class in segregated lists, and freed memory is coalesced
//! immediately. Every pointer is an offset into an arena owned by the
//! allocator, so the whole crate is safe Rust.

#![deny(unsafe_code)]

pub mod arena;
pub mod config;
pub mod error;
pub mod malloc;
pub mod sync;

pub use arena::{Arena, MAX_ARENA_BYTES, VecArena};
pub use config::{AllocatorConfig, ValidationLevel};
pub use error::{AllocError, ArenaError, ConfigError, HeapCheckError};
pub use malloc::{
    AllocatorLogLevel, AllocatorLogRecord, AllocatorStats, BlockInfo, HeapReport,
    LIFECYCLE_LOG_CAPACITY, SegAllocator,
};
pub use sync::LockedAllocator;
