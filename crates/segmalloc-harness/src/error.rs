//! Harness error type.

use segmalloc_core::{AllocError, HeapCheckError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("trace line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("op {op}: allocator error: {source}")]
    Alloc {
        op: usize,
        #[source]
        source: AllocError,
    },
    #[error("op {op}: heap check failed: {source}")]
    HeapCheck {
        op: usize,
        #[source]
        source: HeapCheckError,
    },
    #[error("op {op} (id {id}): {message}")]
    Integrity {
        op: usize,
        id: usize,
        message: String,
    },
}

impl HarnessError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
