//! Realtime worker for event-driven reconciliation

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::gateway::client::GatewayApi;
use crate::provision::tracker::ProvisioningTracker;
use crate::realtime::channels::Channels;
use crate::realtime::client::{ConnectionMonitor, ConnectionState, RealtimeClient};
use crate::realtime::events::RealtimeEvent;
use crate::registry::services::ServiceRegistry;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Realtime worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// WebSocket URL of the event bridge
    pub url: String,

    /// Environment whose channel to subscribe to
    pub environment_id: String,

    /// Reconnect backoff
    pub reconnect: CooldownOptions,

    /// Consecutive failures before the connection is reported as failed
    /// (the worker keeps retrying either way)
    pub advisory_threshold: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: String::new(),
            environment_id: "local".to_string(),
            reconnect: CooldownOptions::default(),
            advisory_threshold: 5,
        }
    }
}

/// Route a decoded event to the subsystem that owns it
pub fn dispatch_event(
    registry: &ServiceRegistry,
    tracker: &ProvisioningTracker,
    event: &RealtimeEvent,
) {
    match event {
        RealtimeEvent::ServiceStatus(changed) => registry.handle_service_status_changed(changed),
        RealtimeEvent::ProjectStatus(changed) => tracker.apply_project_event(changed),
        RealtimeEvent::ProjectDeletion(changed) => tracker.apply_deletion_event(changed),
    }
}

/// Run the realtime worker.
///
/// Maintains the subscription for the environment's channel, dispatching
/// every decoded event. A lost connection degrades to an advisory state and
/// reconnects with capped backoff; it never blocks operations. The recovery
/// sweep runs on every successful (re)connect, closing the window in which
/// events were missed.
pub async fn run<S, F>(
    options: &Options,
    registry: Arc<ServiceRegistry>,
    tracker: Arc<ProvisioningTracker>,
    monitor: Arc<ConnectionMonitor>,
    gateway: Arc<dyn GatewayApi>,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    if options.url.is_empty() {
        info!("Realtime URL not configured, realtime worker will not start.");
        return;
    }

    info!("Realtime worker starting...");

    let channel = Channels::environment(&options.environment_id);
    let mut err_streak: u32 = 0;

    loop {
        let mut client = match RealtimeClient::connect(&options.url).await {
            Ok(client) => client,
            Err(e) => {
                err_streak += 1;
                monitor.set(if err_streak >= options.advisory_threshold {
                    ConnectionState::Failed
                } else {
                    ConnectionState::Disconnected
                });
                error!("Realtime connect failed (attempt {}): {}", err_streak, e);

                let delay = calc_exp_backoff(&options.reconnect, err_streak);
                tokio::select! {
                    _ = &mut shutdown_signal => {
                        info!("Realtime worker shutting down...");
                        return;
                    }
                    _ = sleep_fn(delay) => {}
                }
                continue;
            }
        };

        if let Err(e) = client.subscribe(&channel).await {
            error!("Realtime subscribe failed: {}", e);
            err_streak += 1;
            let delay = calc_exp_backoff(&options.reconnect, err_streak);
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Realtime worker shutting down...");
                    return;
                }
                _ = sleep_fn(delay) => {}
            }
            continue;
        }

        err_streak = 0;
        monitor.set(ConnectionState::Connected);

        // Reconcile anything that resolved while disconnected
        registry.recover_pending_jobs(gateway.as_ref()).await;
        registry.fetch_services(gateway.as_ref()).await;

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    let _ = client.disconnect().await;
                    info!("Realtime worker shutting down...");
                    return;
                }
                polled = client.poll() => {
                    match polled {
                        Ok(Some(frame)) => {
                            if let Some(event) = RealtimeEvent::from_frame(&frame) {
                                dispatch_event(&registry, &tracker, &event);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Realtime poll error: {}, reconnecting...", e);
                            break;
                        }
                    }
                }
            }
        }

        monitor.set(ConnectionState::Disconnected);

        // Brief pause before reconnecting
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Realtime worker shutting down...");
                return;
            }
            _ = sleep_fn(options.reconnect.base_delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::service::{Service, ServiceKind, ServiceStatus};
    use crate::realtime::events::Frame;

    #[test]
    fn test_dispatch_routes_by_event_kind() {
        let tracker = ProvisioningTracker::new();

        // Seed one service so the status update is observable
        let registry = ServiceRegistry::new();
        let mut services = std::collections::HashMap::new();
        services.insert(
            "caddy".to_string(),
            Service {
                name: "caddy".to_string(),
                status: ServiceStatus::Stopped,
                health: None,
                container: None,
                kind: ServiceKind::Docker,
                required: true,
            },
        );
        let mut snapshot = std::collections::HashMap::new();
        snapshot.insert(
            "local".to_string(),
            crate::registry::environment::PersistedEnvironment {
                services,
                last_updated: None,
            },
        );
        registry.restore(snapshot);
        registry.set_active_environment("local");

        let frame = Frame::parse(
            r#"{"event": "service.status.changed", "data": {"service": "caddy", "status": "running"}}"#,
        )
        .unwrap();
        let event = RealtimeEvent::from_frame(&frame).unwrap();
        dispatch_event(&registry, &tracker, &event);
        assert_eq!(registry.services()["caddy"].status, ServiceStatus::Running);

        let frame = Frame::parse(
            r#"{"event": "project.status.changed", "data": {"slug": "blog", "status": "cloning"}}"#,
        )
        .unwrap();
        let event = RealtimeEvent::from_frame(&frame).unwrap();
        dispatch_event(&registry, &tracker, &event);
        assert_eq!(
            tracker.project_status("blog"),
            Some(crate::provision::status::ProvisionStatus::Cloning)
        );

        let frame = Frame::parse(
            r#"{"event": "project.deletion.changed", "data": {"slug": "old", "status": "deleting"}}"#,
        )
        .unwrap();
        let event = RealtimeEvent::from_frame(&frame).unwrap();
        dispatch_event(&registry, &tracker, &event);
        assert_eq!(
            tracker.deletion_status("old"),
            Some(crate::provision::status::DeletionStatus::Deleting)
        );
    }
}
