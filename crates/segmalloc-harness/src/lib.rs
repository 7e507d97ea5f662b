//! Trace tooling for segmalloc.
//!
//! This crate provides:
//! - Trace files: parse, render and generate malloc-lab style workloads
//! - Replay: run a trace against `SegAllocator` with payload integrity checks
//! - Structured logging: JSONL records for replay milestones and allocator events

#![forbid(unsafe_code)]

pub mod error;
pub mod replay;
pub mod structured_log;
pub mod trace;

pub use error::HarnessError;
pub use replay::{ReplayOptions, ReplayReport, replay};
pub use trace::{GenerateParams, Trace, TraceOp};
