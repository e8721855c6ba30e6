// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Delta Rule
//!
//! Per-datapoint change and deviation detection for a telemetry notification
//! pipeline.
//!
//! For every datapoint of a monitored asset the rule remembers the previous
//! reading and decides, on each new one, whether it triggers:
//! - **Deviation mode**: the numeric value moved more than a percentage away
//!   from a moving delta (simple or exponential running average)
//! - **Change mode**: the structured value differs at all from the last one
//!
//! In change mode every observation also contributes an entry to the
//! **action record**, a document keyed by asset and datapoint alias that
//! tells the notification why it fired.
//!
//! ## Quick Start
//!
//! ```rust
//! use delta_rule::{DeltaRule, EvaluationMode, RuleConfig};
//!
//! let rule = DeltaRule::new(RuleConfig::new("pump", EvaluationMode::StructuralEquality));
//!
//! // First reading of a datapoint always triggers
//! assert!(rule.eval(r#"{"pump": {"state": "idle"}}"#));
//! // Same value again: cleared
//! assert!(!rule.eval(r#"{"pump": {"state": "idle"}}"#));
//! // Changed value: triggered, and the reason carries old and new values
//! assert!(rule.eval(r#"{"pump": {"state": "running"}}"#));
//!
//! let reason = rule.reason();
//! assert!(reason.contains(r#""lastValue":"idle","value":"running""#));
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Rule configuration and its parsing
//! - [`selector`]: Datapoint selection and aliases
//! - [`delta`]: Moving delta and percentage deviation
//! - [`snapshot`]: Deep structural equality of readings
//! - [`tracker`]: Per-datapoint state and trigger decisions
//! - [`action`]: Action record builder
//! - [`triggers`]: Trigger registration and notification state
//! - [`rule`]: The configured rule instance and evaluation pass
//! - [`notification`]: Reason payload
//! - [`plugin`]: Plugin information

// Modules
pub mod action;
pub mod config;
pub mod delta;
pub mod error;
pub mod notification;
pub mod plugin;
pub mod rule;
pub mod selector;
pub mod snapshot;
pub mod tracker;
pub mod triggers;

// Re-exports for convenient access
pub use action::ActionRecordBuilder;
pub use config::{AveragingKind, Direction, EvaluationMode, RuleConfig, DEFAULT_CONFIG};
pub use delta::{deviation_pct, MovingDelta};
pub use error::{ConfigError, Result, RuleError};
pub use notification::NotificationReason;
pub use plugin::PluginInfo;
pub use rule::DeltaRule;
pub use selector::DatapointSelector;
pub use tracker::{
    Contribution, DatapointState, DeviationPolicy, Reading, TriggerDecision, ValueTracker,
};
pub use triggers::{RuleTriggers, TriggerSet, TriggerState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
