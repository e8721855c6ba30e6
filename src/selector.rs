// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Datapoint selection and alias resolution.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Which datapoints of the asset are evaluated, and how they are named in
/// the action record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatapointSelector {
    selected: HashSet<String>,
    aliases: HashMap<String, String>,
}

impl DatapointSelector {
    /// Selector accepting every datapoint.
    pub fn all() -> Self {
        Self::default()
    }

    /// Selector accepting only the given names, without aliases.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: names.into_iter().map(Into::into).collect(),
            aliases: HashMap::new(),
        }
    }

    /// Parse the `datapoints` item.
    ///
    /// Accepts a comma-separated list of names, or a JSON object mapping
    /// each name to its alias. Empty text selects everything.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Self::all());
        }

        if text.starts_with('{') {
            let doc: Value = serde_json::from_str(text)
                .map_err(|e| ConfigError::InvalidSelection(e.to_string()))?;
            let entries = doc.as_object().ok_or_else(|| {
                ConfigError::InvalidSelection("expected an object of aliases".to_string())
            })?;
            let mut selector = Self::default();
            for (name, alias) in entries {
                selector.selected.insert(name.clone());
                match alias {
                    Value::String(alias) => {
                        selector.aliases.insert(name.clone(), alias.clone());
                    }
                    other => log::warn!(
                        "Alias for datapoint {} is not a string ({}), using the datapoint name",
                        name,
                        other
                    ),
                }
            }
            return Ok(selector);
        }

        Ok(Self::from_names(
            text.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty()),
        ))
    }

    /// Attach a display alias to a datapoint.
    pub fn with_alias(mut self, datapoint: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(datapoint.into(), alias.into());
        self
    }

    /// Whether the datapoint should be evaluated at all. An empty selection
    /// observes everything; names are matched case-sensitively.
    pub fn is_selected(&self, datapoint: &str) -> bool {
        self.selected.is_empty() || self.selected.contains(datapoint)
    }

    /// Display alias for a datapoint. Missing or empty aliases fall back to
    /// the datapoint name.
    pub fn alias_for<'a>(&'a self, datapoint: &'a str) -> &'a str {
        match self.aliases.get(datapoint) {
            Some(alias) if !alias.is_empty() => alias,
            _ => datapoint,
        }
    }

    /// True when no explicit selection is configured.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Number of explicitly selected datapoints.
    pub fn len(&self) -> usize {
        self.selected.len()
    }
}
