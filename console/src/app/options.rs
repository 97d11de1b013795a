//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::workers::{poller, realtime};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Gateway API base URL
    pub gateway_base_url: String,

    /// Bearer token for remote gateways
    pub gateway_api_token: Option<String>,

    /// Environment the console controls
    pub environment_id: String,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Enable the realtime worker
    pub enable_realtime_worker: bool,

    /// Enable the polling worker
    pub enable_poller: bool,

    /// Realtime worker options
    pub realtime_worker: realtime::Options,

    /// Poller worker options
    pub poller: poller::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            gateway_base_url: "http://127.0.0.1:8787/api".to_string(),
            gateway_api_token: None,
            environment_id: "local".to_string(),
            storage: StorageOptions::default(),
            enable_realtime_worker: true,
            enable_poller: true,
            realtime_worker: realtime::Options::default(),
            poller: poller::Options::default(),
        }
    }
}

/// Lifecycle options for the console
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}
