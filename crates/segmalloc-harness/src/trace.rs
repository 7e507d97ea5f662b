//! malloc-lab trace files.
//!
//! A trace starts with four header numbers (suggested heap size, number of
//! ids, number of ops, weight), followed by one operation per line:
//!
//! ```text
//! a <id> <size>    allocate <size> bytes and bind the block to <id>
//! f <id>           release the block bound to <id>
//! r <id> <size>    reallocate the block bound to <id> to <size> bytes
//! ```
//!
//! Blank lines and `#` comments are ignored.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::HarnessError;

/// One trace operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceOp {
    Alloc { id: usize, size: usize },
    Free { id: usize },
    Realloc { id: usize, size: usize },
}

impl TraceOp {
    #[must_use]
    pub fn id(&self) -> usize {
        match *self {
            Self::Alloc { id, .. } | Self::Free { id } | Self::Realloc { id, .. } => id,
        }
    }
}

/// Parsed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Heap size the trace author suggests; informational only.
    pub suggested_heap: usize,
    /// Ids range over `0..num_ids`.
    pub num_ids: usize,
    pub weight: u32,
    pub ops: Vec<TraceOp>,
}

impl Trace {
    /// Parses trace text.
    pub fn parse(text: &str) -> Result<Self, HarnessError> {
        let mut header: Vec<usize> = Vec::with_capacity(4);
        let mut ops = Vec::new();
        let mut declared_ops = 0;
        let mut num_ids = 0;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();

            if header.len() < 4 {
                for token in tokens {
                    if header.len() == 4 {
                        return Err(HarnessError::parse(line_no, "trailing data after header"));
                    }
                    let value = token.parse().map_err(|_| {
                        HarnessError::parse(line_no, format!("bad header value {token:?}"))
                    })?;
                    header.push(value);
                }
                if header.len() == 4 {
                    num_ids = header[1];
                    declared_ops = header[2];
                }
                continue;
            }

            let kind = tokens.next().unwrap_or("");
            let id = parse_field(line_no, "id", tokens.next())?;
            if id >= num_ids {
                return Err(HarnessError::parse(
                    line_no,
                    format!("id {id} out of range (trace declares {num_ids} ids)"),
                ));
            }
            let op = match kind {
                "a" => TraceOp::Alloc {
                    id,
                    size: parse_field(line_no, "size", tokens.next())?,
                },
                "r" => TraceOp::Realloc {
                    id,
                    size: parse_field(line_no, "size", tokens.next())?,
                },
                "f" => TraceOp::Free { id },
                other => {
                    return Err(HarnessError::parse(
                        line_no,
                        format!("unknown op {other:?}"),
                    ));
                }
            };
            if tokens.next().is_some() {
                return Err(HarnessError::parse(line_no, "trailing tokens"));
            }
            ops.push(op);
        }

        if header.len() < 4 {
            return Err(HarnessError::parse(
                text.lines().count(),
                format!("expected 4 header values, found {}", header.len()),
            ));
        }
        if ops.len() != declared_ops {
            return Err(HarnessError::parse(
                text.lines().count(),
                format!("header declares {declared_ops} ops, found {}", ops.len()),
            ));
        }

        let weight = u32::try_from(header[3])
            .map_err(|_| HarnessError::parse(1, format!("weight {} too large", header[3])))?;
        Ok(Self {
            suggested_heap: header[0],
            num_ids,
            weight,
            ops,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Renders the canonical text form: header values one per line, then
    /// one op per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(16 * (self.ops.len() + 4));
        let _ = writeln!(out, "{}", self.suggested_heap);
        let _ = writeln!(out, "{}", self.num_ids);
        let _ = writeln!(out, "{}", self.ops.len());
        let _ = writeln!(out, "{}", self.weight);
        for op in &self.ops {
            let _ = match *op {
                TraceOp::Alloc { id, size } => writeln!(out, "a {id} {size}"),
                TraceOp::Free { id } => writeln!(out, "f {id}"),
                TraceOp::Realloc { id, size } => writeln!(out, "r {id} {size}"),
            };
        }
        out
    }

    /// SHA-256 of the canonical text, lowercase hex.
    #[must_use]
    pub fn digest(&self) -> String {
        hex_lower(&Sha256::digest(self.to_text().as_bytes()))
    }

    /// Builds a deterministic random trace. Every block still live after the
    /// last generated op is released, so replays end with an empty heap.
    #[must_use]
    pub fn generate(params: &GenerateParams) -> Self {
        let num_ids = params.ids.max(1);
        let max_size = params.max_size.max(1) as u64;
        let realloc_percent = u64::from(params.realloc_percent.min(100));
        let mut rng = XorShift64::new(params.seed);
        let mut live: Vec<usize> = Vec::new();
        let mut idle: Vec<usize> = (0..num_ids).rev().collect();
        let mut ops = Vec::with_capacity(params.ops + num_ids);
        let mut peak = 0usize;
        let mut live_bytes = 0usize;
        let mut sizes = vec![0usize; num_ids];

        for _ in 0..params.ops {
            let roll = rng.below(100);
            let can_alloc = !idle.is_empty();
            if live.is_empty() || (can_alloc && roll < 50) {
                let Some(id) = idle.pop() else { break };
                let size = rng.below(max_size) as usize + 1;
                ops.push(TraceOp::Alloc { id, size });
                live.push(id);
                sizes[id] = size;
                live_bytes += size;
            } else {
                let slot = rng.below(live.len() as u64) as usize;
                let id = live[slot];
                if rng.below(100) < realloc_percent {
                    let size = rng.below(max_size) as usize + 1;
                    ops.push(TraceOp::Realloc { id, size });
                    live_bytes = live_bytes - sizes[id] + size;
                    sizes[id] = size;
                } else {
                    ops.push(TraceOp::Free { id });
                    live.swap_remove(slot);
                    idle.push(id);
                    live_bytes -= sizes[id];
                }
            }
            peak = peak.max(live_bytes);
        }
        for id in live {
            ops.push(TraceOp::Free { id });
        }

        Self {
            suggested_heap: peak.next_power_of_two(),
            num_ids,
            weight: 1,
            ops,
        }
    }
}

/// Parameters for [`Trace::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateParams {
    pub seed: u64,
    /// Ops generated before the trailing releases.
    pub ops: usize,
    pub ids: usize,
    pub max_size: usize,
    /// Share of non-allocating ops that reallocate instead of release.
    pub realloc_percent: u8,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            seed: 0xDEAD_BEEF,
            ops: 1_000,
            ids: 256,
            max_size: 4_096,
            realloc_percent: 20,
        }
    }
}

/// Parses a decimal or `0x` hexadecimal seed; underscores are allowed.
pub fn parse_seed(raw: &str) -> Result<u64, String> {
    let cleaned = raw.trim().replace('_', "");
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => cleaned.parse(),
    };
    parsed.map_err(|err| format!("invalid seed {raw:?}: {err}"))
}

fn parse_field(line: usize, name: &str, token: Option<&str>) -> Result<usize, HarnessError> {
    let token = token.ok_or_else(|| HarnessError::parse(line, format!("missing {name}")))?;
    token
        .parse()
        .map_err(|_| HarnessError::parse(line, format!("bad {name} {token:?}")))
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

struct XorShift64(u64);

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}
