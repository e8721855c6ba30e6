// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Trigger registration and notification state.
//!
//! The notification host drives every built-in rule through the same small
//! contract: which assets the rule subscribes to, whether the last pass
//! triggered, and when it was evaluated. [`RuleTriggers`] is that contract;
//! [`TriggerSet`] is the in-memory implementation used by
//! [`DeltaRule`](crate::rule::DeltaRule).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Notification state after an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerState {
    Triggered,
    #[default]
    Cleared,
}

impl TriggerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerState::Triggered => "triggered",
            TriggerState::Cleared => "cleared",
        }
    }
}

/// Contract between a rule and the host's trigger bookkeeping.
pub trait RuleTriggers {
    /// Subscribe the rule to an asset.
    fn register_trigger(&mut self, asset: &str);

    /// Drop every subscription.
    fn remove_triggers(&mut self);

    /// Whether any asset is subscribed.
    fn has_triggers(&self) -> bool;

    /// Subscribed assets, ordered by name.
    fn assets(&self) -> Vec<String>;

    /// Record the outcome of a pass.
    fn set_state(&mut self, triggered: bool);

    /// Outcome of the last pass.
    fn state(&self) -> TriggerState;

    /// Record the timestamp (seconds since the epoch) of the readings.
    fn set_eval_timestamp(&mut self, timestamp: f64);

    /// Timestamp of the last evaluated readings, if any was supplied.
    fn eval_timestamp(&self) -> Option<f64>;
}

/// In-memory trigger bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    assets: BTreeSet<String>,
    state: TriggerState,
    eval_timestamp: Option<f64>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the asset is subscribed.
    pub fn contains(&self, asset: &str) -> bool {
        self.assets.contains(asset)
    }
}

impl RuleTriggers for TriggerSet {
    fn register_trigger(&mut self, asset: &str) {
        self.assets.insert(asset.to_string());
    }

    fn remove_triggers(&mut self) {
        self.assets.clear();
    }

    fn has_triggers(&self) -> bool {
        !self.assets.is_empty()
    }

    fn assets(&self) -> Vec<String> {
        self.assets.iter().cloned().collect()
    }

    fn set_state(&mut self, triggered: bool) {
        self.state = if triggered {
            TriggerState::Triggered
        } else {
            TriggerState::Cleared
        };
    }

    fn state(&self) -> TriggerState {
        self.state
    }

    fn set_eval_timestamp(&mut self, timestamp: f64) {
        self.eval_timestamp = Some(timestamp);
    }

    fn eval_timestamp(&self) -> Option<f64> {
        self.eval_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let mut triggers = TriggerSet::new();
        assert!(!triggers.has_triggers());

        triggers.register_trigger("valve");
        triggers.register_trigger("pump");
        triggers.register_trigger("pump");
        assert!(triggers.has_triggers());
        assert!(triggers.contains("pump"));
        assert_eq!(triggers.assets(), vec!["pump", "valve"]);

        triggers.remove_triggers();
        assert!(!triggers.has_triggers());
        assert!(triggers.assets().is_empty());
    }

    #[test]
    fn test_state() {
        let mut triggers = TriggerSet::new();
        assert_eq!(triggers.state(), TriggerState::Cleared);

        triggers.set_state(true);
        assert_eq!(triggers.state(), TriggerState::Triggered);
        assert_eq!(triggers.state().as_str(), "triggered");

        triggers.set_state(false);
        assert_eq!(triggers.state().as_str(), "cleared");
    }

    #[test]
    fn test_eval_timestamp() {
        let mut triggers = TriggerSet::new();
        assert!(triggers.eval_timestamp().is_none());
        triggers.set_eval_timestamp(1_700_000_000.5);
        assert_eq!(triggers.eval_timestamp(), Some(1_700_000_000.5));
    }
}
