// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-datapoint value tracking and trigger decisions.
//!
//! The [`ValueTracker`] remembers, for every datapoint name, either a
//! [`MovingDelta`] (numeric deviation mode) or an owned snapshot of the last
//! structured reading (structural equality mode), and decides on each new
//! reading whether it triggers.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::{AveragingKind, Direction, EvaluationMode};
use crate::delta::{deviation_pct, MovingDelta};
use crate::error::{Result, RuleError};
use crate::snapshot::{structurally_equal, to_text};

/// A single reading handed to the tracker.
#[derive(Debug, Clone, Copy)]
pub enum Reading<'a> {
    /// Numeric scalar (deviation mode).
    Numeric(f64),
    /// Arbitrary structured value (equality mode).
    Structured(&'a Value),
}

/// Thresholds applied by the numeric deviation mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationPolicy {
    pub threshold: f64,
    pub direction: Direction,
    pub averaging: AveragingKind,
    pub factor: u32,
}

/// Old and new transport text produced by an equality-mode observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    /// Previous value, `None` on the first observation.
    pub last_value: Option<String>,
    /// New value.
    pub value: String,
}

/// Outcome of one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDecision {
    /// Whether the reading triggers.
    pub triggered: bool,
    /// Deviation from the pre-update baseline, in percent (numeric mode,
    /// absent on the first sample and when the baseline is zero).
    pub deviation_pct: Option<f64>,
    /// Baseline before this reading was folded in (numeric mode).
    pub baseline: Option<f64>,
    /// Action record contribution (equality mode only).
    pub contribution: Option<Contribution>,
}

impl TriggerDecision {
    fn numeric(triggered: bool, deviation_pct: Option<f64>, baseline: Option<f64>) -> Self {
        Self {
            triggered,
            deviation_pct,
            baseline,
            contribution: None,
        }
    }
}

/// Remembered state of one datapoint. The variant always matches the
/// tracker's mode.
#[derive(Debug, Clone, PartialEq)]
pub enum DatapointState {
    Deviation(MovingDelta),
    Snapshot(Value),
}

/// Tracks every datapoint of a rule instance.
#[derive(Debug, Clone)]
pub struct ValueTracker {
    mode: EvaluationMode,
    states: HashMap<String, DatapointState>,
}

impl ValueTracker {
    /// Create an empty tracker for the given mode.
    pub fn new(mode: EvaluationMode) -> Self {
        Self {
            mode,
            states: HashMap::new(),
        }
    }

    /// Mode this tracker evaluates in.
    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Forget every datapoint.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    /// Switch mode. State recorded under the previous mode is discarded.
    pub fn set_mode(&mut self, mode: EvaluationMode) {
        if self.mode != mode {
            self.mode = mode;
            self.reset();
        }
    }

    /// Number of tracked datapoints.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State remembered for a datapoint.
    pub fn state(&self, datapoint: &str) -> Option<&DatapointState> {
        self.states.get(datapoint)
    }

    /// Observe a reading for a datapoint and decide whether it triggers.
    pub fn observe(
        &mut self,
        datapoint: &str,
        reading: Reading<'_>,
        policy: &DeviationPolicy,
    ) -> Result<TriggerDecision> {
        match (self.mode, reading) {
            (EvaluationMode::NumericDeviation, Reading::Numeric(value)) => {
                Ok(self.observe_numeric(datapoint, value, policy))
            }
            (EvaluationMode::StructuralEquality, Reading::Structured(value)) => {
                Ok(self.observe_structured(datapoint, value))
            }
            (mode, _) => Err(RuleError::ModeMismatch {
                datapoint: datapoint.to_string(),
                mode,
            }),
        }
    }

    fn observe_numeric(
        &mut self,
        datapoint: &str,
        value: f64,
        policy: &DeviationPolicy,
    ) -> TriggerDecision {
        if !value.is_finite() {
            log::warn!("Ignoring non-finite value {} for {}", value, datapoint);
            return TriggerDecision::numeric(false, None, None);
        }

        let delta = match self.states.get_mut(datapoint) {
            Some(DatapointState::Deviation(delta)) => delta,
            _ => {
                self.states.insert(
                    datapoint.to_string(),
                    DatapointState::Deviation(MovingDelta::new(value)),
                );
                return TriggerDecision::numeric(false, None, None);
            }
        };

        let prior = delta.baseline();
        if !delta.add_sample(value, policy.averaging, policy.factor) {
            log::warn!(
                "Value {} would overflow the delta of {}, baseline kept at {}",
                value,
                datapoint,
                prior
            );
        }

        let deviation = deviation_pct(value, prior);
        let triggered = match deviation {
            Some(pct) => policy.direction.exceeds(pct, policy.threshold),
            None if prior == 0.0 => {
                log::debug!(
                    "Baseline of {} is zero, no deviation for value {}",
                    datapoint,
                    value
                );
                false
            }
            None => {
                log::warn!(
                    "Deviation of {} from {} for {} is out of range",
                    value,
                    prior,
                    datapoint
                );
                false
            }
        };

        TriggerDecision::numeric(triggered, deviation, Some(prior))
    }

    fn observe_structured(&mut self, datapoint: &str, value: &Value) -> TriggerDecision {
        let snapshot = value.clone();
        let value_text = to_text(value);

        match self.states.get_mut(datapoint) {
            Some(DatapointState::Snapshot(last)) => {
                let changed = !structurally_equal(last, value);
                let previous = std::mem::replace(last, snapshot);
                TriggerDecision {
                    triggered: changed,
                    deviation_pct: None,
                    baseline: None,
                    contribution: Some(Contribution {
                        last_value: Some(to_text(&previous)),
                        value: value_text,
                    }),
                }
            }
            _ => {
                self.states
                    .insert(datapoint.to_string(), DatapointState::Snapshot(snapshot));
                TriggerDecision {
                    triggered: true,
                    deviation_pct: None,
                    baseline: None,
                    contribution: Some(Contribution {
                        last_value: None,
                        value: value_text,
                    }),
                }
            }
        }
    }
}
