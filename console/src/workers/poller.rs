//! Polling worker for periodic reconciliation
//!
//! The fallback path when the realtime channel is degraded: stale
//! environment caches are refreshed and the pending-job sweep re-run, so
//! the console converges on gateway truth without a single pushed event.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::gateway::client::GatewayApi;
use crate::registry::services::ServiceRegistry;
use crate::storage::state_file::{PersistedState, StateFile};

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the poller worker
pub async fn run<S, F>(
    options: &Options,
    registry: Arc<ServiceRegistry>,
    gateway: Arc<dyn GatewayApi>,
    state_file: Arc<StateFile>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    // Initial delay
    sleep_fn(options.initial_delay).await;

    loop {
        // Check for shutdown
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {
                // Continue with poll
            }
        }

        if !registry.is_stale() {
            continue;
        }

        debug!("Cache is stale, refreshing...");

        registry.recover_pending_jobs(gateway.as_ref()).await;
        if registry.fetch_services(gateway.as_ref()).await {
            let state = PersistedState {
                environments: registry.snapshot(),
            };
            if let Err(e) = state_file.save(&state).await {
                error!("Failed to persist environment state: {}", e);
            }
        }
    }
}
