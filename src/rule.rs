// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! DeltaRule - one configured rule instance.
//!
//! Configuration and trigger bookkeeping sit behind one lock, so the host's
//! administrative path can reconfigure while readings are evaluated. The
//! value tracker and action record belong to the evaluation path and sit
//! behind their own lock. A reconfiguration never touches them directly; the
//! next evaluation picks up the new settings (and resets the tracker when
//! the mode changed).
//!
//! When both locks are needed they are taken evaluation first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::action::ActionRecordBuilder;
use crate::config::{EvaluationMode, RuleConfig};
use crate::error::{Result, RuleError};
use crate::notification::NotificationReason;
use crate::selector::DatapointSelector;
use crate::tracker::{DeviationPolicy, Reading, TriggerDecision, ValueTracker};
use crate::triggers::{RuleTriggers, TriggerSet, TriggerState};

/// Configuration side, shared with the administrative path.
struct Guarded {
    config: RuleConfig,
    triggers: TriggerSet,
}

/// Evaluation side, touched only by the thread driving a pass.
struct Evaluation {
    tracker: ValueTracker,
    record: ActionRecordBuilder,
    last_action: Option<String>,
}

/// Settings captured from the configuration for one pass.
struct PassSettings {
    assets: Vec<String>,
    mode: EvaluationMode,
    policy: DeviationPolicy,
    selector: DatapointSelector,
}

/// The Delta notification rule.
pub struct DeltaRule {
    guarded: Mutex<Guarded>,
    evaluation: Mutex<Evaluation>,
}

impl DeltaRule {
    /// Create a rule and subscribe it to the configured asset.
    pub fn new(config: RuleConfig) -> Self {
        let mut triggers = TriggerSet::new();
        triggers.register_trigger(&config.asset);

        Self {
            evaluation: Mutex::new(Evaluation {
                tracker: ValueTracker::new(config.mode),
                record: ActionRecordBuilder::new(),
                last_action: None,
            }),
            guarded: Mutex::new(Guarded { config, triggers }),
        }
    }

    /// Create a rule from a configuration category document.
    pub fn from_category_json(json: &str) -> Result<Self> {
        Ok(Self::new(RuleConfig::from_category_json(json)?))
    }

    /// Replace the configuration. Existing triggers are removed and the new
    /// asset is registered.
    pub fn configure(&self, config: RuleConfig) {
        let mut guarded = lock(&self.guarded);
        if guarded.triggers.has_triggers() {
            guarded.triggers.remove_triggers();
        }
        guarded.triggers.register_trigger(&config.asset);

        log::info!(
            "Delta rule configured for asset {} in {} mode",
            config.asset,
            config.mode.as_str()
        );
        guarded.config = config;
    }

    /// Parse a configuration category document and apply it. On error the
    /// current configuration stays in place.
    pub fn reconfigure(&self, json: &str) -> Result<()> {
        let config = RuleConfig::from_category_json(json)?;
        self.configure(config);
        Ok(())
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> RuleConfig {
        lock(&self.guarded).config.clone()
    }

    /// Assets this rule subscribes to.
    pub fn monitored_assets(&self) -> Vec<String> {
        lock(&self.guarded).triggers.assets()
    }

    /// Trigger document for the host: `{"triggers":[{"asset":"name"},...]}`.
    pub fn triggers_json(&self) -> String {
        let assets = self.monitored_assets();
        let entries: Vec<String> = assets
            .iter()
            .map(|asset| format!("{{\"asset\":{}}}", Value::from(asset.as_str())))
            .collect();
        format!("{{\"triggers\":[{}]}}", entries.join(","))
    }

    /// Evaluate one datapoint reading.
    ///
    /// Equality-mode observations are added to the pending action record,
    /// which stays pending until it is taken with
    /// [`take_action_record`](Self::take_action_record). The next
    /// [`eval`](Self::eval) pass discards whatever is still pending.
    pub fn evaluate(&self, asset: &str, datapoint: &str, value: &Value) -> Result<TriggerDecision> {
        let settings = self.pass_settings();
        let mut evaluation = lock(&self.evaluation);
        observe(&mut evaluation, &settings, asset, datapoint, value)
    }

    /// Run one evaluation pass over a reading batch.
    ///
    /// Unparseable batches are not triggered and leave the rule state
    /// untouched.
    pub fn eval(&self, batch: &str) -> bool {
        match self.evaluate_batch(batch) {
            Ok(triggered) => triggered,
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Run one evaluation pass over a reading batch.
    ///
    /// The batch maps each asset name to an object of datapoint readings,
    /// with an optional `timestamp_<asset>` number. Every selected datapoint
    /// of every monitored asset is observed in document order and the
    /// results are OR-ed. A datapoint that fails evaluation is logged and
    /// skipped.
    pub fn evaluate_batch(&self, batch: &str) -> Result<bool> {
        let doc: Value =
            serde_json::from_str(batch).map_err(|e| RuleError::InvalidBatch(e.to_string()))?;
        let readings = doc
            .as_object()
            .ok_or_else(|| RuleError::InvalidBatch("expected an object".to_string()))?;

        let settings = self.pass_settings();
        let mut triggered = false;
        let mut timestamp = None;

        {
            let mut evaluation = lock(&self.evaluation);
            // A pass reports only its own observations
            evaluation.record.clear();

            for asset in &settings.assets {
                let Some(asset_value) = readings.get(asset) else {
                    continue;
                };

                match asset_value.as_object() {
                    Some(datapoints) => {
                        for (datapoint, value) in datapoints {
                            if !settings.selector.is_selected(datapoint) {
                                continue;
                            }
                            match observe(&mut evaluation, &settings, asset, datapoint, value) {
                                Ok(decision) => triggered |= decision.triggered,
                                Err(e) => {
                                    log::warn!("Skipping datapoint {}.{}: {}", asset, datapoint, e)
                                }
                            }
                        }
                    }
                    None => log::warn!("Readings for asset {} are not an object", asset),
                }

                if let Some(ts) = readings
                    .get(&format!("timestamp_{}", asset))
                    .and_then(Value::as_f64)
                {
                    timestamp = Some(ts);
                }
            }

            if triggered {
                let action = evaluation.record.retrieve_and_clear();
                evaluation.last_action = action;
            } else {
                evaluation.record.clear();
                evaluation.last_action = None;
            }

            // Lock order: evaluation, then guarded
            let mut guarded = lock(&self.guarded);
            guarded.triggers.set_state(triggered);
            if let Some(ts) = timestamp {
                guarded.triggers.set_eval_timestamp(ts);
            }
        }

        log::debug!("Evaluated {} bytes of readings, triggered: {}", batch.len(), triggered);
        Ok(triggered)
    }

    /// Outcome of the last pass.
    pub fn state(&self) -> TriggerState {
        lock(&self.guarded).triggers.state()
    }

    /// Action record retrieved by the last triggered pass.
    pub fn last_action(&self) -> Option<String> {
        lock(&self.evaluation).last_action.clone()
    }

    /// Take the pending action record built by direct
    /// [`evaluate`](Self::evaluate) calls.
    pub fn take_action_record(&self) -> Option<String> {
        lock(&self.evaluation).record.retrieve_and_clear()
    }

    /// Discard the pending action record.
    pub fn clear_action_record(&self) {
        lock(&self.evaluation).record.clear();
    }

    /// Forget every tracked datapoint.
    pub fn reset(&self) {
        let mut evaluation = lock(&self.evaluation);
        evaluation.tracker.reset();
        evaluation.record.clear();
        evaluation.last_action = None;
    }

    /// Number of datapoints currently tracked.
    pub fn tracked_datapoints(&self) -> usize {
        lock(&self.evaluation).tracker.len()
    }

    /// Reason for the current notification state.
    pub fn notification_reason(&self) -> NotificationReason {
        let evaluation = lock(&self.evaluation);
        let guarded = lock(&self.guarded);
        let state = guarded.triggers.state();
        let assets = guarded.triggers.assets();
        let timestamp = guarded.triggers.eval_timestamp();

        let action = match state {
            TriggerState::Triggered => evaluation.last_action.clone(),
            TriggerState::Cleared => None,
        };
        drop(guarded);
        drop(evaluation);
        let payload = action.unwrap_or_else(|| Value::from(assets).to_string());

        NotificationReason {
            state,
            payload,
            timestamp,
        }
    }

    /// Reason document for the host.
    pub fn reason(&self) -> String {
        self.notification_reason().to_json()
    }

    fn pass_settings(&self) -> PassSettings {
        let guarded = lock(&self.guarded);
        let config = &guarded.config;
        PassSettings {
            assets: guarded.triggers.assets(),
            mode: config.mode,
            policy: DeviationPolicy {
                threshold: config.deviation_threshold,
                direction: config.direction,
                averaging: config.averaging,
                factor: config.smoothing_factor,
            },
            selector: config.selector.clone(),
        }
    }
}

fn observe(
    evaluation: &mut Evaluation,
    settings: &PassSettings,
    asset: &str,
    datapoint: &str,
    value: &Value,
) -> Result<TriggerDecision> {
    if evaluation.tracker.mode() != settings.mode {
        log::info!(
            "Evaluation mode changed to {}, resetting tracked datapoints",
            settings.mode.as_str()
        );
        evaluation.tracker.set_mode(settings.mode);
    }

    let reading = match settings.mode {
        EvaluationMode::NumericDeviation => {
            Reading::Numeric(value.as_f64().ok_or_else(|| RuleError::NonNumericValue {
                datapoint: datapoint.to_string(),
                value: value.to_string(),
            })?)
        }
        EvaluationMode::StructuralEquality => Reading::Structured(value),
    };

    let decision = evaluation
        .tracker
        .observe(datapoint, reading, &settings.policy)?;

    if let Some(ref contribution) = decision.contribution {
        evaluation.record.begin_or_append(
            asset,
            settings.selector.alias_for(datapoint),
            &contribution.value,
            contribution.last_value.as_deref(),
        );
    }

    if decision.triggered {
        match (decision.deviation_pct, decision.baseline, &decision.contribution) {
            (Some(pct), Some(baseline), _) => log::warn!(
                "Deviation of {:.1}% in {}.{} triggered alert, value is {}, delta is {:.2}",
                pct,
                asset,
                datapoint,
                value,
                baseline
            ),
            (_, _, Some(contribution)) => log::warn!(
                "{}.{} triggered, last value: {}, value: {}",
                asset,
                datapoint,
                contribution.last_value.as_deref().unwrap_or("null"),
                contribution.value
            ),
            _ => log::warn!("{}.{} triggered", asset, datapoint),
        }
    }

    Ok(decision)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Direction;
    use serde_json::json;

    fn change_rule() -> DeltaRule {
        DeltaRule::new(RuleConfig::new("pump", EvaluationMode::StructuralEquality))
    }

    fn deviation_rule(threshold: f64, direction: Direction) -> DeltaRule {
        let mut config = RuleConfig::new("pump", EvaluationMode::NumericDeviation);
        config.deviation_threshold = threshold;
        config.direction = direction;
        DeltaRule::new(config)
    }

    #[test]
    fn test_new_registers_asset() {
        let rule = change_rule();
        assert_eq!(rule.monitored_assets(), vec!["pump"]);
        assert_eq!(rule.triggers_json(), r#"{"triggers":[{"asset":"pump"}]}"#);
        assert_eq!(rule.state(), TriggerState::Cleared);
    }

    #[test]
    fn test_configure_replaces_trigger() {
        let rule = change_rule();
        rule.configure(RuleConfig::new("valve", EvaluationMode::StructuralEquality));
        assert_eq!(rule.monitored_assets(), vec!["valve"]);
        assert_eq!(rule.config().asset, "valve");
    }

    #[test]
    fn test_evaluate_feeds_action_record() {
        let rule = change_rule();
        let decision = rule.evaluate("pump", "rpm", &json!(900)).unwrap();
        assert!(decision.triggered);

        assert_eq!(
            rule.take_action_record().unwrap(),
            r#"{"pump":[{"rpm":{"lastValue":null,"value":900}}]}"#
        );
        assert!(rule.take_action_record().is_none());
    }

    #[test]
    fn test_numeric_mode_does_not_feed_action_record() {
        let rule = deviation_rule(10.0, Direction::Both);
        rule.evaluate("pump", "rpm", &json!(100)).unwrap();
        let decision = rule.evaluate("pump", "rpm", &json!(150)).unwrap();

        assert!(decision.triggered);
        assert!(rule.take_action_record().is_none());
    }

    #[test]
    fn test_numeric_mode_rejects_non_numeric() {
        let rule = deviation_rule(10.0, Direction::Both);
        let result = rule.evaluate("pump", "status", &json!("running"));
        assert!(matches!(result, Err(RuleError::NonNumericValue { .. })));
        assert_eq!(rule.tracked_datapoints(), 0);
    }

    #[test]
    fn test_alias_used_in_record() {
        let mut config = RuleConfig::new("pump", EvaluationMode::StructuralEquality);
        config.selector = DatapointSelector::all().with_alias("rpm", "Speed");
        let rule = DeltaRule::new(config);

        rule.evaluate("pump", "rpm", &json!(1)).unwrap();
        let record = rule.take_action_record().unwrap();
        assert!(record.contains("\"Speed\""));
        assert!(!record.contains("\"rpm\""));
    }

    #[test]
    fn test_mode_change_resets_tracker() {
        let rule = deviation_rule(10.0, Direction::Both);
        rule.evaluate("pump", "rpm", &json!(100)).unwrap();
        assert_eq!(rule.tracked_datapoints(), 1);

        rule.configure(RuleConfig::new("pump", EvaluationMode::StructuralEquality));
        // Reconfiguration alone leaves the tracker alone
        assert_eq!(rule.tracked_datapoints(), 1);

        let decision = rule.evaluate("pump", "rpm", &json!(100)).unwrap();
        // First observation in the new mode
        assert!(decision.triggered);
        assert_eq!(rule.tracked_datapoints(), 1);
    }

    #[test]
    fn test_threshold_change_keeps_baseline() {
        let rule = deviation_rule(50.0, Direction::Both);
        rule.evaluate("pump", "rpm", &json!(100)).unwrap();
        assert!(!rule.evaluate("pump", "rpm", &json!(120)).unwrap().triggered);

        let mut config = rule.config();
        config.deviation_threshold = 1.0;
        rule.configure(config);

        // Baseline is 110 after two samples; 130 is ~18% above it
        assert!(rule.evaluate("pump", "rpm", &json!(130)).unwrap().triggered);
    }

    #[test]
    fn test_pass_discards_pending_evaluations() {
        let rule = change_rule();
        rule.evaluate("pump", "manual", &json!(1)).unwrap();

        assert!(rule.eval(r#"{"pump": {"rpm": 900}}"#));
        assert_eq!(
            rule.last_action().unwrap(),
            r#"{"pump":[{"rpm":{"lastValue":null,"value":900}}]}"#
        );
    }

    #[test]
    fn test_reset() {
        let rule = change_rule();
        rule.evaluate("pump", "rpm", &json!(1)).unwrap();
        rule.reset();
        assert_eq!(rule.tracked_datapoints(), 0);
        assert!(rule.take_action_record().is_none());
    }

    #[test]
    fn test_reconfigure_error_keeps_config() {
        let rule = change_rule();
        assert!(rule.reconfigure("{").is_err());
        assert!(rule.reconfigure(r#"{"asset": ""}"#).is_err());
        assert_eq!(rule.config().asset, "pump");

        rule.reconfigure(r#"{"asset": {"value": "valve"}}"#).unwrap();
        assert_eq!(rule.monitored_assets(), vec!["valve"]);
    }
}
