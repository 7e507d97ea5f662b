//! CLI entrypoint for the segmalloc trace harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use segmalloc_core::{AllocatorConfig, ValidationLevel};
use segmalloc_harness::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use segmalloc_harness::trace::parse_seed;
use segmalloc_harness::{GenerateParams, ReplayOptions, Trace, replay};

/// Trace tooling for segmalloc.
#[derive(Debug, Parser)]
#[command(name = "segmalloc-harness")]
#[command(about = "Replay, generate and check malloc-lab traces against segmalloc")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a trace and print a JSON report.
    Replay {
        /// Trace file.
        #[arg(long)]
        trace: PathBuf,
        /// Allocator validation level (`off`, `tags`, `full`). Defaults to
        /// `SEGMALLOC_VALIDATE` or `off`.
        #[arg(long)]
        validate: Option<String>,
        /// Run the heap checker after every op.
        #[arg(long)]
        check_each_op: bool,
        /// Arena extension increment in bytes.
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Arena byte limit.
        #[arg(long)]
        arena_limit: Option<usize>,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Report output path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate a deterministic random trace.
    Generate {
        /// Root seed (decimal or 0x...).
        #[arg(long, default_value = "0xDEAD_BEEF")]
        seed: String,
        /// Number of ops before the trailing releases.
        #[arg(long, default_value_t = 1_000)]
        ops: usize,
        /// Number of distinct block ids.
        #[arg(long, default_value_t = 256)]
        ids: usize,
        /// Largest request size in bytes.
        #[arg(long, default_value_t = 4_096)]
        max_size: usize,
        /// Percentage of non-allocating ops that reallocate.
        #[arg(long, default_value_t = 20)]
        realloc_percent: u8,
        /// Output trace path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Replay traces with the heap checker after every op; reports each
    /// failing trace and exits non-zero if any failed.
    Check {
        /// Trace files.
        #[arg(required = true)]
        traces: Vec<PathBuf>,
        /// Emit one JSONL summary line per trace to stdout.
        #[arg(long)]
        jsonl: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            trace,
            validate,
            check_each_op,
            chunk_size,
            arena_limit,
            log,
            output,
        } => {
            let mut config = AllocatorConfig::from_env()?;
            if let Some(level) = validate {
                config.validation = ValidationLevel::from_str_loose(&level);
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(arena_limit) = arena_limit {
                config.arena_limit = arena_limit;
            }
            config.validate()?;
            config.lifecycle_logging = log.is_some();

            let parsed = Trace::from_file(&trace)?;
            let options = ReplayOptions {
                config,
                check_each_op,
            };
            let run_id = trace
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("trace")
                .to_string();
            let mut emitter = match &log {
                Some(path) => Some(LogEmitter::to_file(path, &run_id)?),
                None => None,
            };

            let report = replay(&parsed, &options, emitter.as_mut())?;
            let json = report.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }
            eprintln!(
                "Replayed {} ops: peak_live={} heap={} utilization={:.3}",
                report.ops, report.peak_live_bytes, report.final_heap_bytes, report.utilization
            );
        }
        Command::Generate {
            seed,
            ops,
            ids,
            max_size,
            realloc_percent,
            output,
        } => {
            let params = GenerateParams {
                seed: parse_seed(&seed)?,
                ops,
                ids,
                max_size,
                realloc_percent,
            };
            let trace = Trace::generate(&params);
            let text = trace.to_text();
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    eprintln!(
                        "Generated {} ops ({}) to {}",
                        trace.ops.len(),
                        trace.digest(),
                        path.display()
                    );
                }
                None => print!("{text}"),
            }
        }
        Command::Check { traces, jsonl } => {
            let options = ReplayOptions::verifying();
            let mut stdout_log = jsonl.then(|| LogEmitter::to_stdout("check"));
            let mut failures = 0usize;

            for path in &traces {
                let outcome = Trace::from_file(path).and_then(|trace| replay(&trace, &options, None));
                match outcome {
                    Ok(report) => {
                        eprintln!(
                            "PASS {} ops={} utilization={:.3}",
                            path.display(),
                            report.ops,
                            report.utilization
                        );
                        if let Some(log) = stdout_log.as_mut() {
                            log.emit_entry(
                                LogEntry::new("", LogLevel::Info, "trace_pass")
                                    .with_outcome(Outcome::Pass)
                                    .with_details(serde_json::json!({
                                        "trace": path.display().to_string(),
                                        "report": report,
                                    })),
                            )?;
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        eprintln!("FAIL {}: {err}", path.display());
                        if let Some(log) = stdout_log.as_mut() {
                            log.emit_entry(
                                LogEntry::new("", LogLevel::Error, "trace_fail")
                                    .with_outcome(Outcome::Fail)
                                    .with_details(serde_json::json!({
                                        "trace": path.display().to_string(),
                                        "error": err.to_string(),
                                    })),
                            )?;
                        }
                    }
                }
            }
            if let Some(log) = stdout_log.as_mut() {
                log.flush()?;
            }
            if failures > 0 {
                return Err(format!("{failures} of {} traces failed", traces.len()).into());
            }
        }
    }

    Ok(())
}
