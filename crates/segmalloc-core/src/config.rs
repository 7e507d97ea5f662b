//! Allocator configuration.
//!
//! Defaults match the classic tuning: a 64-byte initial free block and 4 KiB
//! extension chunks. Runs can be reconfigured through the environment:
//! - `SEGMALLOC_VALIDATE`: `off` (default), `tags`, or `full`.
//! - `SEGMALLOC_CHUNK_SIZE`: extension increment in bytes.
//! - `SEGMALLOC_ARENA_LIMIT`: maximum arena size in bytes.

use crate::arena::MAX_ARENA_BYTES;
use crate::error::ConfigError;
use crate::malloc::layout::{ALIGNMENT, SENTINEL_BYTES};

/// Default arena extension increment (bytes).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

/// Default size of the free block created at initialization (bytes).
pub const DEFAULT_INITIAL_CHUNK: usize = 1 << 6;

/// How much checking the allocator does on its own.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationLevel {
    /// No checks. Invalid release targets are undefined behavior.
    #[default]
    Off,
    /// Release/realloc targets are checked before the heap is touched.
    Tags,
    /// `Tags`, plus a full heap check after every mutating operation.
    Full,
}

impl ValidationLevel {
    /// Parse from string (case-insensitive). Unknown values mean `Off`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "tags" | "debug" | "precondition" => Self::Tags,
            "full" | "paranoid" | "heap" => Self::Full,
            _ => Self::Off,
        }
    }

    /// Returns true if release/realloc targets are checked.
    #[must_use]
    pub const fn checks_targets(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Returns true if the heap is checked after every operation.
    #[must_use]
    pub const fn checks_heap(self) -> bool {
        matches!(self, Self::Full)
    }
}

/// Tunables for one allocator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Minimum number of bytes requested from the arena on a miss.
    pub chunk_size: usize,
    /// Free block carved at initialization. Zero skips it.
    pub initial_chunk: usize,
    /// Maximum arena size in bytes.
    pub arena_limit: usize,
    pub validation: ValidationLevel,
    /// Record structured lifecycle events.
    pub lifecycle_logging: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            initial_chunk: DEFAULT_INITIAL_CHUNK,
            arena_limit: MAX_ARENA_BYTES,
            validation: ValidationLevel::Off,
            lifecycle_logging: true,
        }
    }
}

impl AllocatorConfig {
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_initial_chunk(mut self, initial_chunk: usize) -> Self {
        self.initial_chunk = initial_chunk;
        self
    }

    #[must_use]
    pub fn with_arena_limit(mut self, arena_limit: usize) -> Self {
        self.arena_limit = arena_limit;
        self
    }

    #[must_use]
    pub fn with_validation(mut self, validation: ValidationLevel) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn with_lifecycle_logging(mut self, enabled: bool) -> Self {
        self.lifecycle_logging = enabled;
        self
    }

    /// Checks that the sizes can be honored by the block layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size % ALIGNMENT != 0 {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.initial_chunk % ALIGNMENT != 0 {
            return Err(ConfigError::InitialChunk(self.initial_chunk));
        }
        if self.arena_limit < SENTINEL_BYTES || self.arena_limit > MAX_ARENA_BYTES {
            return Err(ConfigError::ArenaLimit {
                limit: self.arena_limit,
                min: SENTINEL_BYTES,
                max: MAX_ARENA_BYTES,
            });
        }
        Ok(())
    }

    /// Defaults overridden by `SEGMALLOC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AllocatorConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("SEGMALLOC_VALIDATE") {
            config.validation = ValidationLevel::from_str_loose(&raw);
        }
        if let Some(raw) = lookup("SEGMALLOC_CHUNK_SIZE") {
            config.chunk_size = parse_bytes("SEGMALLOC_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("SEGMALLOC_ARENA_LIMIT") {
            config.arena_limit = parse_bytes("SEGMALLOC_ARENA_LIMIT", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parses a decimal or `0x` hexadecimal byte count.
fn parse_bytes(name: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let trimmed = raw.trim().replace('_', "");
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => trimmed.parse(),
    };
    parsed.map_err(|_| ConfigError::Env {
        name,
        value: raw.to_string(),
    })
}
