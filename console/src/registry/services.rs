//! Service registry implementation

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::gateway::client::GatewayApi;
use crate::gateway::responses::{ActionResponse, JobState};
use crate::models::service::{GlobalAction, PendingJob, Service, ServiceAction, ServiceKind, ServiceStatus};
use crate::realtime::events::ServiceStatusChanged;
use crate::registry::environment::{EnvironmentCache, PersistedEnvironment, STALENESS_THRESHOLD_SECS};

/// Per-environment service state and in-flight job tracking.
///
/// Caches are created lazily per environment id and live for the session;
/// only one environment is active for dispatch at a time, but every cache
/// stays readable.
pub struct ServiceRegistry {
    environments: RwLock<HashMap<String, EnvironmentCache>>,
    active: RwLock<Option<String>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            environments: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
        }
    }

    /// Switch the active environment, lazily initializing its cache
    pub fn set_active_environment(&self, id: &str) {
        {
            let mut environments = self.environments.write().unwrap_or_else(|e| e.into_inner());
            environments.entry(id.to_string()).or_default();
        }
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        *active = Some(id.to_string());
    }

    /// Get the active environment id
    pub fn active_environment(&self) -> Option<String> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn read_active<R>(&self, f: impl FnOnce(&EnvironmentCache) -> R) -> Option<R> {
        let active = self.active_environment()?;
        let environments = self.environments.read().unwrap_or_else(|e| e.into_inner());
        environments.get(&active).map(f)
    }

    fn write_active<R>(&self, f: impl FnOnce(&mut EnvironmentCache) -> R) -> Option<R> {
        let active = self.active_environment()?;
        let mut environments = self.environments.write().unwrap_or_else(|e| e.into_inner());
        environments.get_mut(&active).map(f)
    }

    /// Replace the active environment's service map from the gateway.
    ///
    /// On failure the cached state is preserved and the error logged; the
    /// return value reports whether a refresh happened.
    pub async fn fetch_services(&self, gateway: &dyn GatewayApi) -> bool {
        if self.active_environment().is_none() {
            return false;
        }

        match gateway.fetch_status().await {
            Ok(services) => {
                self.write_active(|cache| {
                    cache.services = services;
                    cache.last_updated = Some(Utc::now());
                });
                true
            }
            Err(e) => {
                warn!("Service fetch failed, keeping cached state: {}", e);
                false
            }
        }
    }

    /// Dispatch a control action against one service.
    ///
    /// Registers a pending job when the gateway acknowledges with a job id.
    /// The service map is never mutated here; the eventual event or a
    /// caller-triggered refresh reconciles status. Network failures fold
    /// into a failed outcome so callers can phrase the message themselves.
    pub async fn dispatch_service_action(
        &self,
        service: &str,
        action: ServiceAction,
        kind: ServiceKind,
        gateway: &dyn GatewayApi,
    ) -> ActionResponse {
        match gateway.service_action(kind, service, action).await {
            Ok(response) => {
                if let Some(job_id) = response.job_id.clone() {
                    info!("Dispatched {} {} as job {}", action, service, job_id);
                    self.write_active(|cache| {
                        cache
                            .pending_jobs
                            .insert(job_id.clone(), PendingJob::new(job_id, service, action));
                    });
                }
                response
            }
            Err(e) => ActionResponse::failure(e.to_string()),
        }
    }

    /// Dispatch a bulk start/stop/restart.
    ///
    /// Fire-and-forget: no job is registered; callers refresh explicitly.
    pub async fn dispatch_global_action(
        &self,
        action: GlobalAction,
        gateway: &dyn GatewayApi,
    ) -> ActionResponse {
        match gateway.global_action(action).await {
            Ok(response) => response,
            Err(e) => ActionResponse::failure(e.to_string()),
        }
    }

    /// Apply a `service.status.changed` event.
    ///
    /// Idempotent: duplicate events and unknown job ids are harmless. A
    /// failure event marks the job sticky-failed instead of removing it, so
    /// the error stays visible next to the service until dismissed. Events
    /// without a job id (bulk actions) only update the service status.
    pub fn handle_service_status_changed(&self, event: &ServiceStatusChanged) {
        self.write_active(|cache| {
            if let Some(job_id) = &event.job_id {
                match &event.error {
                    Some(error) => {
                        if let Some(job) = cache.pending_jobs.get_mut(job_id) {
                            job.error = Some(error.clone());
                        }
                    }
                    None => {
                        cache.pending_jobs.remove(job_id);
                    }
                }
            }

            if let Some(entry) = cache.services.get_mut(&event.service) {
                entry.status = ServiceStatus::from(event.status.as_str());
            }

            cache.last_updated = Some(Utc::now());
        });
    }

    /// Sweep pending jobs against the gateway's job records.
    ///
    /// Run on mount and on every realtime reconnect. Jobs past the staleness
    /// threshold are dropped without a query; a missing job record counts as
    /// resolved.
    pub async fn recover_pending_jobs(&self, gateway: &dyn GatewayApi) {
        let jobs: Vec<PendingJob> = self
            .read_active(|cache| cache.pending_jobs.values().cloned().collect())
            .unwrap_or_default();

        let now = Utc::now();
        for job in jobs {
            if now - job.started_at > Duration::seconds(STALENESS_THRESHOLD_SECS) {
                debug!("Dropping orphaned job {} ({})", job.job_id, job.service);
                self.write_active(|cache| {
                    cache.pending_jobs.remove(&job.job_id);
                });
                continue;
            }

            match gateway.job_status(&job.job_id).await {
                Ok(record) => match record.status {
                    JobState::Completed => {
                        self.write_active(|cache| {
                            cache.pending_jobs.remove(&job.job_id);
                        });
                    }
                    JobState::Failed => {
                        let error = record.error.unwrap_or_else(|| "Job failed".to_string());
                        self.write_active(|cache| {
                            if let Some(entry) = cache.pending_jobs.get_mut(&job.job_id) {
                                entry.error = Some(error.clone());
                            }
                        });
                    }
                    JobState::Running => {}
                },
                Err(e) => {
                    debug!(
                        "Job {} has no record ({}), treating as resolved",
                        job.job_id, e
                    );
                    self.write_active(|cache| {
                        cache.pending_jobs.remove(&job.job_id);
                    });
                }
            }
        }
    }

    /// Dismiss every errored job for a service
    pub fn clear_service_error(&self, service: &str) {
        self.write_active(|cache| {
            cache
                .pending_jobs
                .retain(|_, job| !(job.service == service && job.error.is_some()));
        });
    }

    /// Dismiss one errored job by id
    pub fn clear_pending_job_error(&self, job_id: &str) {
        self.write_active(|cache| {
            if cache
                .pending_jobs
                .get(job_id)
                .is_some_and(|job| job.error.is_some())
            {
                cache.pending_jobs.remove(job_id);
            }
        });
    }

    /// Count of services currently running in the active environment
    pub fn services_running(&self) -> usize {
        self.read_active(|cache| {
            cache
                .services
                .values()
                .filter(|s| s.status == ServiceStatus::Running)
                .count()
        })
        .unwrap_or(0)
    }

    /// Total services in the active environment
    pub fn services_total(&self) -> usize {
        self.read_active(|cache| cache.services.len()).unwrap_or(0)
    }

    /// Whether any pending job references the service
    pub fn is_service_pending(&self, service: &str) -> bool {
        self.read_active(|cache| {
            cache
                .pending_jobs
                .values()
                .any(|job| job.service == service)
        })
        .unwrap_or(false)
    }

    /// First recorded error among the service's jobs, if any
    pub fn service_error(&self, service: &str) -> Option<String> {
        self.read_active(|cache| {
            cache
                .pending_jobs
                .values()
                .filter(|job| job.service == service)
                .find_map(|job| job.error.clone())
        })
        .flatten()
    }

    /// Whether the active environment's cache needs a refresh
    pub fn is_stale(&self) -> bool {
        self.read_active(|cache| cache.is_stale()).unwrap_or(false)
    }

    /// Snapshot of the active environment's services, for display
    pub fn services(&self) -> HashMap<String, Service> {
        self.read_active(|cache| cache.services.clone())
            .unwrap_or_default()
    }

    /// Durable snapshot of every environment (services and freshness only)
    pub fn snapshot(&self) -> HashMap<String, PersistedEnvironment> {
        let environments = self.environments.read().unwrap_or_else(|e| e.into_inner());
        environments
            .iter()
            .map(|(id, cache)| (id.clone(), cache.to_persisted()))
            .collect()
    }

    /// Restore environment caches from a durable snapshot.
    ///
    /// Pending jobs are never restored; the recovery sweep rebuilds them.
    pub fn restore(&self, snapshot: HashMap<String, PersistedEnvironment>) {
        let mut environments = self.environments.write().unwrap_or_else(|e| e.into_inner());
        for (id, persisted) in snapshot {
            environments.insert(id, EnvironmentCache::from(persisted));
        }
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::errors::ConsoleError;
    use crate::gateway::responses::{JobStatusResponse, ProjectCommandResponse, ProjectList};
    use crate::models::project::CreateProjectRequest;
    use crate::models::service::{Service, ServiceKind};

    fn service(name: &str, status: ServiceStatus) -> Service {
        Service {
            name: name.to_string(),
            status,
            health: None,
            container: None,
            kind: ServiceKind::Docker,
            required: false,
        }
    }

    /// Scripted gateway stub
    #[derive(Default)]
    struct StubGateway {
        status: Mutex<Option<HashMap<String, Service>>>,
        action_responses: Mutex<Vec<ActionResponse>>,
        job_records: Mutex<HashMap<String, JobStatusResponse>>,
        job_calls: AtomicUsize,
    }

    impl StubGateway {
        fn with_action(self, response: ActionResponse) -> Self {
            self.action_responses.lock().unwrap().push(response);
            self
        }

        fn acknowledged(job_id: &str) -> ActionResponse {
            serde_json::from_value(serde_json::json!({
                "success": true,
                "jobId": job_id,
            }))
            .unwrap()
        }
    }

    #[async_trait]
    impl GatewayApi for StubGateway {
        async fn fetch_status(&self) -> Result<HashMap<String, Service>, ConsoleError> {
            self.status
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| ConsoleError::GatewayError("offline".to_string()))
        }

        async fn service_action(
            &self,
            _kind: ServiceKind,
            _service: &str,
            _action: ServiceAction,
        ) -> Result<ActionResponse, ConsoleError> {
            let mut responses = self.action_responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ConsoleError::GatewayError("offline".to_string()));
            }
            Ok(responses.remove(0))
        }

        async fn global_action(
            &self,
            _action: GlobalAction,
        ) -> Result<ActionResponse, ConsoleError> {
            Ok(ActionResponse {
                success: true,
                job_id: None,
                error: None,
            })
        }

        async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, ConsoleError> {
            self.job_calls.fetch_add(1, Ordering::SeqCst);
            self.job_records
                .lock()
                .unwrap()
                .get(job_id)
                .cloned()
                .ok_or_else(|| ConsoleError::NotFound(job_id.to_string()))
        }

        async fn list_projects(&self) -> Result<ProjectList, ConsoleError> {
            unimplemented!("not used by registry tests")
        }

        async fn create_project(
            &self,
            _request: &CreateProjectRequest,
        ) -> Result<ProjectCommandResponse, ConsoleError> {
            unimplemented!("not used by registry tests")
        }

        async fn delete_project(
            &self,
            _slug: &str,
        ) -> Result<ProjectCommandResponse, ConsoleError> {
            unimplemented!("not used by registry tests")
        }
    }

    fn registry_with_service(name: &str, status: ServiceStatus) -> ServiceRegistry {
        let registry = ServiceRegistry::new();
        registry.set_active_environment("local");
        registry.write_active(|cache| {
            cache.services.insert(name.to_string(), service(name, status));
            cache.last_updated = Some(Utc::now());
        });
        registry
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let registry = registry_with_service("redis", ServiceStatus::Stopped);
        let gateway = StubGateway::default().with_action(StubGateway::acknowledged("abc"));

        let outcome = registry
            .dispatch_service_action("redis", ServiceAction::Start, ServiceKind::Docker, &gateway)
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.job_id.as_deref(), Some("abc"));
        assert!(registry.is_service_pending("redis"));
        assert_eq!(
            registry.read_active(|c| c.pending_jobs.len()).unwrap(),
            1
        );

        registry.handle_service_status_changed(&ServiceStatusChanged {
            job_id: Some("abc".to_string()),
            service: "redis".to_string(),
            status: "running".to_string(),
            action: Some("start".to_string()),
            error: None,
            timestamp: None,
        });

        assert!(!registry.is_service_pending("redis"));
        assert_eq!(
            registry.services()["redis"].status,
            ServiceStatus::Running
        );
    }

    #[tokio::test]
    async fn test_event_application_is_idempotent() {
        let registry = registry_with_service("redis", ServiceStatus::Stopped);
        let gateway = StubGateway::default().with_action(StubGateway::acknowledged("abc"));
        registry
            .dispatch_service_action("redis", ServiceAction::Start, ServiceKind::Docker, &gateway)
            .await;

        let event = ServiceStatusChanged {
            job_id: Some("abc".to_string()),
            service: "redis".to_string(),
            status: "running".to_string(),
            action: None,
            error: None,
            timestamp: None,
        };

        registry.handle_service_status_changed(&event);
        let services_once = registry.services();
        let jobs_once = registry.read_active(|c| c.pending_jobs.len()).unwrap();

        registry.handle_service_status_changed(&event);
        assert_eq!(registry.services()["redis"].status, services_once["redis"].status);
        assert_eq!(registry.read_active(|c| c.pending_jobs.len()).unwrap(), jobs_once);
        assert_eq!(jobs_once, 0);
    }

    #[tokio::test]
    async fn test_unknown_job_event_is_harmless() {
        let registry = registry_with_service("redis", ServiceStatus::Stopped);

        registry.handle_service_status_changed(&ServiceStatusChanged {
            job_id: Some("never-dispatched".to_string()),
            service: "redis".to_string(),
            status: "running".to_string(),
            action: None,
            error: None,
            timestamp: None,
        });

        assert_eq!(registry.services()["redis"].status, ServiceStatus::Running);
        assert!(!registry.is_service_pending("redis"));
    }

    #[tokio::test]
    async fn test_concurrent_dual_dispatch() {
        let registry = registry_with_service("caddy", ServiceStatus::Running);
        let gateway = StubGateway::default()
            .with_action(StubGateway::acknowledged("j1"))
            .with_action(StubGateway::acknowledged("j2"));

        registry
            .dispatch_service_action("caddy", ServiceAction::Restart, ServiceKind::Docker, &gateway)
            .await;
        registry
            .dispatch_service_action("caddy", ServiceAction::Restart, ServiceKind::Docker, &gateway)
            .await;
        assert!(registry.is_service_pending("caddy"));
        assert_eq!(registry.read_active(|c| c.pending_jobs.len()).unwrap(), 2);

        registry.handle_service_status_changed(&ServiceStatusChanged {
            job_id: Some("j1".to_string()),
            service: "caddy".to_string(),
            status: "error".to_string(),
            action: None,
            error: Some("timeout".to_string()),
            timestamp: None,
        });

        // j1 keeps its sticky error, j2 is untouched
        assert_eq!(registry.service_error("caddy").as_deref(), Some("timeout"));
        assert!(registry.is_service_pending("caddy"));
        let jobs = registry
            .read_active(|c| c.pending_jobs.clone())
            .unwrap();
        assert!(jobs["j1"].error.is_some());
        assert!(jobs["j2"].error.is_none());
    }

    #[tokio::test]
    async fn test_orphan_sweep_skips_network() {
        let registry = registry_with_service("redis", ServiceStatus::Running);
        registry.write_active(|cache| {
            let mut job = PendingJob::new("old", "redis", ServiceAction::Restart);
            job.started_at = Utc::now() - Duration::milliseconds(301_000);
            cache.pending_jobs.insert("old".to_string(), job);
        });

        let gateway = StubGateway::default();
        registry.recover_pending_jobs(&gateway).await;

        assert!(!registry.is_service_pending("redis"));
        assert_eq!(gateway.job_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recovery_resolves_fresh_jobs() {
        let registry = registry_with_service("redis", ServiceStatus::Running);
        registry.write_active(|cache| {
            cache.pending_jobs.insert(
                "done".to_string(),
                PendingJob::new("done", "redis", ServiceAction::Restart),
            );
            cache.pending_jobs.insert(
                "broken".to_string(),
                PendingJob::new("broken", "redis", ServiceAction::Stop),
            );
            cache.pending_jobs.insert(
                "missing".to_string(),
                PendingJob::new("missing", "redis", ServiceAction::Start),
            );
        });

        let gateway = StubGateway::default();
        {
            let mut records = gateway.job_records.lock().unwrap();
            records.insert(
                "done".to_string(),
                serde_json::from_str(r#"{"status": "completed"}"#).unwrap(),
            );
            records.insert(
                "broken".to_string(),
                serde_json::from_str(r#"{"status": "failed", "error": "exit 1"}"#).unwrap(),
            );
            // "missing" has no record; the query 404s
        }

        registry.recover_pending_jobs(&gateway).await;

        let jobs = registry.read_active(|c| c.pending_jobs.clone()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs["broken"].error.as_deref(), Some("exit 1"));
    }

    #[tokio::test]
    async fn test_fetch_failure_preserves_cache() {
        let registry = registry_with_service("redis", ServiceStatus::Running);
        let gateway = StubGateway::default(); // fetch_status errors

        let refreshed = registry.fetch_services(&gateway).await;
        assert!(!refreshed);
        assert_eq!(registry.services_total(), 1);
        assert_eq!(registry.services()["redis"].status, ServiceStatus::Running);
    }

    #[tokio::test]
    async fn test_fetch_replaces_services() {
        let registry = registry_with_service("redis", ServiceStatus::Running);
        let gateway = StubGateway::default();
        {
            let mut status = gateway.status.lock().unwrap();
            let mut map = HashMap::new();
            map.insert("caddy".to_string(), service("caddy", ServiceStatus::Running));
            map.insert("mysql".to_string(), service("mysql", ServiceStatus::Stopped));
            *status = Some(map);
        }

        assert!(registry.fetch_services(&gateway).await);
        assert_eq!(registry.services_total(), 2);
        assert_eq!(registry.services_running(), 1);
        assert!(!registry.services().contains_key("redis"));
    }

    #[test]
    fn test_staleness_rule() {
        let registry = ServiceRegistry::new();
        registry.set_active_environment("local");

        registry.write_active(|cache| {
            cache.last_updated = Some(Utc::now() - Duration::minutes(6));
        });
        assert!(registry.is_stale());

        registry.write_active(|cache| {
            cache.last_updated = Some(Utc::now() - Duration::minutes(4));
        });
        assert!(!registry.is_stale());
    }

    #[test]
    fn test_error_dismissal() {
        let registry = registry_with_service("caddy", ServiceStatus::Error);
        registry.write_active(|cache| {
            let mut job = PendingJob::new("j1", "caddy", ServiceAction::Restart);
            job.error = Some("timeout".to_string());
            cache.pending_jobs.insert("j1".to_string(), job);
            cache.pending_jobs.insert(
                "j2".to_string(),
                PendingJob::new("j2", "caddy", ServiceAction::Restart),
            );
        });

        // Dismissing by job id removes only the errored job
        registry.clear_pending_job_error("j2"); // no error, kept
        registry.clear_pending_job_error("j1");
        let jobs = registry.read_active(|c| c.pending_jobs.clone()).unwrap();
        assert!(jobs.contains_key("j2"));
        assert!(!jobs.contains_key("j1"));

        // Dismissing by service sweeps every errored job for it
        registry.write_active(|cache| {
            let mut job = PendingJob::new("j3", "caddy", ServiceAction::Stop);
            job.error = Some("boom".to_string());
            cache.pending_jobs.insert("j3".to_string(), job);
        });
        registry.clear_service_error("caddy");
        let jobs = registry.read_active(|c| c.pending_jobs.clone()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert!(jobs.contains_key("j2"));
    }

    #[test]
    fn test_environment_switching_keeps_caches() {
        let registry = ServiceRegistry::new();
        registry.set_active_environment("local");
        registry.write_active(|cache| {
            cache
                .services
                .insert("redis".to_string(), service("redis", ServiceStatus::Running));
        });

        registry.set_active_environment("droplet");
        assert_eq!(registry.services_total(), 0);

        registry.set_active_environment("local");
        assert_eq!(registry.services_total(), 1);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let registry = registry_with_service("redis", ServiceStatus::Running);
        registry.write_active(|cache| {
            cache.pending_jobs.insert(
                "j1".to_string(),
                PendingJob::new("j1", "redis", ServiceAction::Restart),
            );
        });

        let snapshot = registry.snapshot();

        let restored = ServiceRegistry::new();
        restored.restore(snapshot);
        restored.set_active_environment("local");
        assert_eq!(restored.services_total(), 1);
        // Jobs are session-scoped and never persisted
        assert!(!restored.is_service_pending("redis"));
    }
}
