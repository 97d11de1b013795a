//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;
use crate::logs::LogLevel;

/// Console settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Realtime channel configuration
    #[serde(default)]
    pub realtime: RealtimeSettings,

    /// Environment this console controls by default
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Enable the realtime worker
    #[serde(default = "default_true")]
    pub enable_realtime_worker: bool,

    /// Enable the polling worker
    #[serde(default = "default_true")]
    pub enable_poller: bool,

    /// Polling interval in seconds
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_polling_interval() -> u64 {
    30
}

fn default_environment() -> String {
    "local".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            gateway: GatewaySettings::default(),
            realtime: RealtimeSettings::default(),
            environment: default_environment(),
            enable_realtime_worker: true,
            enable_poller: true,
            polling_interval_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from disk; a missing file yields defaults
    pub async fn load(path: &Path) -> Result<Self, ConsoleError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Gateway API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Base URL for the gateway API
    #[serde(default = "default_gateway_url")]
    pub base_url: String,

    /// Bearer token for remote gateways; local daemons need none
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_gateway_url() -> String {
    "http://127.0.0.1:8787/api".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_token: None,
        }
    }
}

/// Realtime channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// WebSocket URL for the event bridge
    #[serde(default = "default_realtime_url")]
    pub url: String,
}

fn default_realtime_url() -> String {
    "ws://127.0.0.1:8787/ws".to_string()
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: default_realtime_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"gateway": {"base_url": "http://10.0.0.5:8787/api"}}"#)
                .unwrap();

        assert_eq!(settings.gateway.base_url, "http://10.0.0.5:8787/api");
        assert_eq!(settings.environment, "local");
        assert!(settings.enable_realtime_worker);
        assert_eq!(settings.polling_interval_secs, 30);
    }
}
