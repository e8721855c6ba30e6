// Delta Rule Replay - Replays reading batches through the Delta rule
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Delta Rule Replay
//!
//! Feeds recorded reading batches through a Delta rule and prints the
//! notification reason of every triggered pass.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a JSON-lines file of batches
//! delta-rule-replay --config category.json --batches readings.jsonl
//!
//! # Show every trigger as it is logged
//! delta-rule-replay --config category.json --batches readings.jsonl --log-level warn
//! ```

mod replay;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use replay::{ReplayConfig, ReplayEngine};

/// Delta notification rule replay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration category JSON file
    #[arg(short, long)]
    config: PathBuf,

    /// JSON-lines file, one reading batch per line
    #[arg(short, long)]
    batches: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("Delta rule replay v{}", env!("CARGO_PKG_VERSION"));

    let config = ReplayConfig {
        config_path: args.config,
        batches_path: args.batches,
    };

    let engine = match ReplayEngine::from_files(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start replay: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout().lock();
    match engine.run(&mut stdout) {
        Ok(summary) => {
            if let Err(e) = writeln!(
                stdout,
                "{} passes, {} triggered, {} skipped lines",
                summary.passes, summary.triggered, summary.skipped
            ) {
                error!("Unable to write summary: {}", e);
                return ExitCode::FAILURE;
            }
            info!(
                "{} datapoints tracked",
                engine.rule().tracked_datapoints()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Replay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
