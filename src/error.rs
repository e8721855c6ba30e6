// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the Delta rule
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

use crate::config::EvaluationMode;

/// Result type alias for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Main error type for rule operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A reading could not be used as a number in deviation mode
    #[error("Non-numeric value for datapoint {datapoint}: {value}")]
    NonNumericValue { datapoint: String, value: String },

    /// A reading was handed to a tracker running in the other mode
    #[error("Reading for datapoint {datapoint} does not match {mode:?} mode")]
    ModeMismatch {
        datapoint: String,
        mode: EvaluationMode,
    },

    /// The inbound batch document could not be parsed
    #[error("Invalid reading batch: {0}")]
    InvalidBatch(String),
}

/// Errors while building a rule configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Required key absent or empty
    #[error("Missing configuration item: {0}")]
    MissingItem(&'static str),

    /// Value could not be parsed as a number
    #[error("Invalid number for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    /// Unknown direction keyword
    #[error("Unknown direction: {0:?}")]
    UnknownDirection(String),

    /// Unknown evaluation mode keyword
    #[error("Unknown evaluation mode: {0:?}")]
    UnknownMode(String),

    /// The datapoints item is neither a list nor a JSON object
    #[error("Invalid datapoints selection: {0}")]
    InvalidSelection(String),

    /// The configuration category document is malformed
    #[error("Malformed configuration category: {0}")]
    MalformedCategory(String),
}
