// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Rule configuration.
//!
//! A [`RuleConfig`] is built from the flat `key -> text` items the
//! notification host hands over, either directly as a map or as a
//! configuration category JSON document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::selector::DatapointSelector;

/// Default deviation threshold in percent.
pub const DEFAULT_DEVIATION: f64 = 10.0;

/// Default smoothing window for the exponential moving delta.
pub const DEFAULT_FACTOR: u32 = 10;

/// Default configuration category published by the plugin.
pub const DEFAULT_CONFIG: &str = r#"{
    "description": {
        "description": "Trigger if the current value deviates from the last one",
        "type": "string",
        "default": "Delta",
        "readonly": "true"
    },
    "plugin": {
        "description": "Trigger if the current value deviates from the last one",
        "type": "string",
        "default": "Delta",
        "readonly": "true"
    },
    "asset": {
        "description": "Asset to monitor",
        "type": "string",
        "default": "",
        "displayName": "Asset",
        "order": "1"
    },
    "datapoints": {
        "description": "Datapoint(s) to monitor. If this input field is empty, a change in any of the existing datapoints or a newly added one will trigger",
        "type": "string",
        "default": "",
        "displayName": "Datapoint(s)",
        "order": "2"
    },
    "mode": {
        "description": "Trigger on any change of the value, or on a deviation from the moving delta",
        "type": "enumeration",
        "options": ["Change", "Deviation"],
        "default": "Change",
        "displayName": "Mode",
        "order": "3"
    },
    "deviation": {
        "description": "Percentage deviation from the moving delta that triggers",
        "type": "integer",
        "default": "10",
        "displayName": "Deviation %",
        "order": "4"
    },
    "direction": {
        "description": "Direction of the deviation that triggers",
        "type": "enumeration",
        "options": ["Both", "Above Delta", "Below Delta"],
        "default": "Both",
        "displayName": "Direction",
        "order": "5"
    },
    "deltaType": {
        "description": "Moving delta used as the baseline",
        "type": "enumeration",
        "options": ["Simple Moving Delta", "Exponential Moving Delta"],
        "default": "Simple Moving Delta",
        "displayName": "Delta Type",
        "order": "6"
    },
    "factor": {
        "description": "Smoothing window of the exponential moving delta",
        "type": "integer",
        "default": "10",
        "displayName": "EMA Factor",
        "order": "7"
    }
}"#;

/// How readings are evaluated. Fixed for the lifetime of a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvaluationMode {
    /// Numeric readings compared against a moving baseline.
    NumericDeviation,
    /// Structured readings compared against the previous snapshot.
    StructuralEquality,
}

impl EvaluationMode {
    /// Parse the `mode` configuration keyword.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text.trim() {
            "" | "Change" => Ok(EvaluationMode::StructuralEquality),
            "Deviation" => Ok(EvaluationMode::NumericDeviation),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationMode::NumericDeviation => "Deviation",
            EvaluationMode::StructuralEquality => "Change",
        }
    }
}

/// Which side of the baseline a deviation must fall on to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Above,
    Below,
    Both,
}

impl Direction {
    /// Parse the `direction` configuration keyword.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text.trim() {
            "" | "Both" => Ok(Direction::Both),
            "Above Delta" | "Above" => Ok(Direction::Above),
            "Below Delta" | "Below" => Ok(Direction::Below),
            other => Err(ConfigError::UnknownDirection(other.to_string())),
        }
    }

    /// Whether a deviation (in percent) is beyond `threshold` on this side.
    pub fn exceeds(&self, deviation_pct: f64, threshold: f64) -> bool {
        match self {
            Direction::Both => deviation_pct.abs() > threshold,
            Direction::Above => deviation_pct > threshold,
            Direction::Below => -deviation_pct > threshold,
        }
    }
}

/// Moving delta flavour used for the numeric baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AveragingKind {
    /// Cumulative arithmetic mean of every sample.
    Simple,
    /// Running average whose window is capped at the smoothing factor.
    Exponential,
}

impl AveragingKind {
    /// Parse the `deltaType` keyword. Anything but the simple keyword
    /// selects the exponential delta.
    pub fn parse(text: &str) -> Self {
        if text.trim() == "Simple Moving Delta" {
            AveragingKind::Simple
        } else {
            AveragingKind::Exponential
        }
    }
}

/// Complete configuration of one rule instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Asset to monitor.
    pub asset: String,
    /// Evaluation mode.
    pub mode: EvaluationMode,
    /// Deviation threshold in percent (numeric mode only).
    pub deviation_threshold: f64,
    /// Side of the baseline that triggers (numeric mode only).
    pub direction: Direction,
    /// Moving delta flavour (numeric mode only).
    pub averaging: AveragingKind,
    /// Window cap of the exponential delta, always >= 1.
    pub smoothing_factor: u32,
    /// Datapoint selection and display aliases.
    pub selector: DatapointSelector,
}

impl RuleConfig {
    /// Create a configuration with defaults for everything but the asset.
    pub fn new(asset: impl Into<String>, mode: EvaluationMode) -> Self {
        Self {
            asset: asset.into(),
            mode,
            deviation_threshold: DEFAULT_DEVIATION,
            direction: Direction::Both,
            averaging: AveragingKind::Simple,
            smoothing_factor: DEFAULT_FACTOR,
            selector: DatapointSelector::default(),
        }
    }

    /// Build a configuration from flat `key -> text` items.
    pub fn from_map(items: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let item = |key: &str| items.get(key).map(|s| s.trim()).unwrap_or("");

        let asset = item("asset");
        if asset.is_empty() {
            return Err(ConfigError::MissingItem("asset"));
        }

        let deviation_threshold = match item("deviation") {
            "" => DEFAULT_DEVIATION,
            text => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ConfigError::InvalidNumber {
                    key: "deviation",
                    value: text.to_string(),
                })?,
        };

        let factor = match item("factor") {
            "" => i64::from(DEFAULT_FACTOR),
            text => text.parse::<i64>().map_err(|_| ConfigError::InvalidNumber {
                key: "factor",
                value: text.to_string(),
            })?,
        };
        let smoothing_factor = if factor < 1 {
            log::warn!("EMA factor {} is below 1, using 1", factor);
            1
        } else {
            u32::try_from(factor).unwrap_or(u32::MAX)
        };

        Ok(Self {
            asset: asset.to_string(),
            mode: EvaluationMode::parse(item("mode"))?,
            deviation_threshold,
            direction: Direction::parse(item("direction"))?,
            averaging: AveragingKind::parse(match item("deltaType") {
                "" => "Simple Moving Delta",
                text => text,
            }),
            smoothing_factor,
            selector: DatapointSelector::parse(item("datapoints"))?,
        })
    }

    /// Build a configuration from a configuration category document.
    ///
    /// Each item is either a plain string or an object carrying `value`
    /// (preferred) or `default`.
    pub fn from_category_json(json: &str) -> Result<Self, ConfigError> {
        let doc: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::MalformedCategory(e.to_string()))?;
        let category = doc
            .as_object()
            .ok_or_else(|| ConfigError::MalformedCategory("expected an object".to_string()))?;

        let mut items = HashMap::with_capacity(category.len());
        for (key, item) in category {
            if let Some(text) = item_text(item) {
                items.insert(key.clone(), text);
            }
        }

        Self::from_map(&items)
    }

    /// Smoothing parameters handed to the moving delta.
    pub fn smoothing(&self) -> (AveragingKind, u32) {
        (self.averaging, self.smoothing_factor)
    }
}

fn item_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(fields) => fields
            .get("value")
            .or_else(|| fields.get("default"))
            .and_then(item_text),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = RuleConfig::from_map(&items(&[("asset", "pump")])).unwrap();
        assert_eq!(config.asset, "pump");
        assert_eq!(config.mode, EvaluationMode::StructuralEquality);
        assert_eq!(config.deviation_threshold, DEFAULT_DEVIATION);
        assert_eq!(config.direction, Direction::Both);
        assert_eq!(config.averaging, AveragingKind::Simple);
        assert_eq!(config.smoothing_factor, DEFAULT_FACTOR);
        assert!(config.selector.is_empty());
    }

    #[test]
    fn test_missing_asset() {
        let result = RuleConfig::from_map(&items(&[("asset", "  ")]));
        assert_eq!(result.unwrap_err(), ConfigError::MissingItem("asset"));
    }

    #[test]
    fn test_numeric_items() {
        let config = RuleConfig::from_map(&items(&[
            ("asset", "pump"),
            ("mode", "Deviation"),
            ("deviation", "25"),
            ("direction", "Below Delta"),
            ("deltaType", "Exponential Moving Delta"),
            ("factor", "4"),
        ]))
        .unwrap();

        assert_eq!(config.mode, EvaluationMode::NumericDeviation);
        assert_eq!(config.deviation_threshold, 25.0);
        assert_eq!(config.direction, Direction::Below);
        assert_eq!(config.smoothing(), (AveragingKind::Exponential, 4));
    }

    #[test]
    fn test_invalid_deviation() {
        let result = RuleConfig::from_map(&items(&[("asset", "pump"), ("deviation", "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber { key: "deviation", .. })
        ));
    }

    #[test]
    fn test_non_finite_deviation_rejected() {
        for text in ["NaN", "inf", "-inf", "infinity"] {
            let result = RuleConfig::from_map(&items(&[("asset", "pump"), ("deviation", text)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidNumber { key: "deviation", .. })),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_factor_clamped() {
        let config = RuleConfig::from_map(&items(&[("asset", "pump"), ("factor", "0")])).unwrap();
        assert_eq!(config.smoothing_factor, 1);
    }

    #[test]
    fn test_unknown_direction() {
        let result = RuleConfig::from_map(&items(&[("asset", "pump"), ("direction", "Sideways")]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::UnknownDirection("Sideways".to_string())
        );
    }

    #[test]
    fn test_unknown_delta_type_is_exponential() {
        assert_eq!(AveragingKind::parse("Whatever"), AveragingKind::Exponential);
        assert_eq!(
            AveragingKind::parse("Simple Moving Delta"),
            AveragingKind::Simple
        );
    }

    #[test]
    fn test_direction_exceeds() {
        assert!(Direction::Both.exceeds(-15.0, 10.0));
        assert!(Direction::Both.exceeds(15.0, 10.0));
        assert!(!Direction::Both.exceeds(10.0, 10.0));
        assert!(Direction::Above.exceeds(15.0, 10.0));
        assert!(!Direction::Above.exceeds(-15.0, 10.0));
        assert!(Direction::Below.exceeds(-15.0, 10.0));
        assert!(!Direction::Below.exceeds(15.0, 10.0));
    }

    #[test]
    fn test_category_json() {
        let json = r#"{
            "asset": { "value": "boiler", "default": "" },
            "mode": { "default": "Deviation" },
            "deviation": "5",
            "factor": 3,
            "datapoints": { "value": "{\"temp\": \"Temperature\"}" }
        }"#;
        let config = RuleConfig::from_category_json(json).unwrap();

        assert_eq!(config.asset, "boiler");
        assert_eq!(config.mode, EvaluationMode::NumericDeviation);
        assert_eq!(config.deviation_threshold, 5.0);
        assert_eq!(config.smoothing_factor, 3);
        assert!(config.selector.is_selected("temp"));
        assert_eq!(config.selector.alias_for("temp"), "Temperature");
    }

    #[test]
    fn test_default_config_is_valid_json() {
        let doc: Value = serde_json::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(doc["plugin"]["default"], "Delta");
        // Asset defaults to empty, so the defaults alone are not a usable rule.
        assert!(RuleConfig::from_category_json(DEFAULT_CONFIG).is_err());
    }

    #[test]
    fn test_malformed_category() {
        assert!(matches!(
            RuleConfig::from_category_json("not json"),
            Err(ConfigError::MalformedCategory(_))
        ));
        assert!(matches!(
            RuleConfig::from_category_json("[1, 2]"),
            Err(ConfigError::MalformedCategory(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = RuleConfig::new("pump", EvaluationMode::NumericDeviation);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RuleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.asset, config.asset);
        assert_eq!(parsed.mode, config.mode);
    }
}
