// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Notification reason payload.

use chrono::{DateTime, Utc};

use crate::triggers::TriggerState;

/// Reason document handed to the notification host after a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationReason {
    /// Triggered or cleared.
    pub state: TriggerState,
    /// JSON text placed under `"asset"`: the action record, or the list of
    /// monitored assets.
    pub payload: String,
    /// Evaluation timestamp in seconds since the epoch.
    pub timestamp: Option<f64>,
}

impl NotificationReason {
    /// Render as `{"reason":..,"asset":..[,"timestamp":..]}`.
    pub fn to_json(&self) -> String {
        let mut out = format!(
            "{{\"reason\":\"{}\",\"asset\":{}",
            self.state.as_str(),
            self.payload
        );
        if let Some(utc) = self.timestamp.and_then(format_utc_timestamp) {
            out.push_str(",\"timestamp\":");
            out.push_str(&serde_json::Value::from(utc).to_string());
        }
        out.push('}');
        out
    }
}

/// Format seconds since the epoch as `YYYY-MM-DD HH:MM:SS.ffffff+00:00`.
pub fn format_utc_timestamp(timestamp: f64) -> Option<String> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let micros = ((timestamp - secs) * 1_000_000.0).round().min(999_999.0) as u32;
    let utc = DateTime::<Utc>::from_timestamp(secs as i64, micros * 1_000)?;
    Some(utc.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string())
}
