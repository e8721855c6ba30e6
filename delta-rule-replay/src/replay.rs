// Delta Rule Replay - Batch replay engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Replays a JSON-lines file of reading batches through a Delta rule.
//!
//! Each non-empty line is one evaluation pass. Lines that cannot be parsed
//! as a batch are counted and skipped.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use delta_rule::{DeltaRule, RuleError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid rule configuration: {0}")]
    Config(#[from] RuleError),
}

/// Configuration for a replay run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Configuration category document for the rule.
    pub config_path: PathBuf,
    /// JSON-lines file, one reading batch per line.
    pub batches_path: PathBuf,
}

/// Counters reported at the end of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Passes run (non-empty, parseable lines).
    pub passes: usize,
    /// Passes that triggered a notification.
    pub triggered: usize,
    /// Lines that could not be evaluated.
    pub skipped: usize,
}

/// Drives a rule over recorded batches.
pub struct ReplayEngine {
    rule: DeltaRule,
    batches_path: PathBuf,
}

impl ReplayEngine {
    /// Build the rule from the configuration file.
    pub fn from_files(config: &ReplayConfig) -> Result<Self, ReplayError> {
        let category = read_existing(&config.config_path)?;
        let rule = DeltaRule::from_category_json(&category)?;

        info!(
            "Monitoring {:?} in {} mode",
            rule.monitored_assets(),
            rule.config().mode.as_str()
        );

        if !config.batches_path.exists() {
            return Err(ReplayError::FileNotFound(
                config.batches_path.display().to_string(),
            ));
        }

        Ok(Self {
            rule,
            batches_path: config.batches_path.clone(),
        })
    }

    /// The rule being replayed.
    pub fn rule(&self) -> &DeltaRule {
        &self.rule
    }

    /// Replay every batch, writing one `line <n>: <reason>` per triggered
    /// pass to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<ReplaySummary, ReplayError> {
        let reader = BufReader::new(fs::File::open(&self.batches_path)?);
        let mut summary = ReplaySummary::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            match self.rule.evaluate_batch(&line) {
                Ok(true) => {
                    summary.passes += 1;
                    summary.triggered += 1;
                    writeln!(out, "line {}: {}", line_no, self.rule.reason())?;
                }
                Ok(false) => {
                    summary.passes += 1;
                    debug!("line {}: cleared", line_no);
                }
                Err(e) => {
                    summary.skipped += 1;
                    warn!("line {}: {}", line_no, e);
                }
            }
        }

        Ok(summary)
    }
}

fn read_existing(path: &Path) -> Result<String, ReplayError> {
    if !path.exists() {
        return Err(ReplayError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}
