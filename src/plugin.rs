// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Plugin description published to the notification host.

use serde::Serialize;

use crate::config::DEFAULT_CONFIG;

/// Rule name as registered with the host.
pub const RULE_NAME: &str = "Delta";

/// Host interface version implemented.
pub const INTERFACE_VERSION: &str = "1.0.0";

/// Plugin type tag.
pub const PLUGIN_TYPE: &str = "notificationRule";

/// Static plugin information.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub flags: u32,
    #[serde(rename = "type")]
    pub plugin_type: &'static str,
    pub interface: &'static str,
    pub config: serde_json::Value,
}

impl PluginInfo {
    /// Information for this build.
    pub fn current() -> Self {
        Self {
            name: RULE_NAME,
            version: crate::VERSION,
            flags: 0,
            plugin_type: PLUGIN_TYPE,
            interface: INTERFACE_VERSION,
            config: serde_json::from_str(DEFAULT_CONFIG).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_info() {
        let info = PluginInfo::current();
        assert_eq!(info.name, "Delta");
        assert!(info.config.is_object());

        let json = info.to_json().unwrap();
        assert!(json.contains("\"type\":\"notificationRule\""));
        assert!(json.contains("\"interface\":\"1.0.0\""));
    }
}
