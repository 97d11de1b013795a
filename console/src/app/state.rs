//! Application state management

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::ConsoleError;
use crate::gateway::client::{GatewayApi, GatewayClient};
use crate::gateway::responses::{ActionResponse, ProjectCommandResponse};
use crate::models::project::CreateProjectRequest;
use crate::models::service::{GlobalAction, ServiceAction, ServiceKind};
use crate::provision::status::ProvisionStatus;
use crate::provision::tracker::{ProjectEntry, ProvisioningTracker};
use crate::realtime::client::ConnectionMonitor;
use crate::registry::services::ServiceRegistry;
use crate::storage::state_file::{PersistedState, StateFile};
use crate::utils::slugify;

/// Main application state
pub struct AppState {
    /// HTTP client for the environment's gateway
    pub gateway: Arc<GatewayClient>,

    /// Service status and job tracking
    pub registry: Arc<ServiceRegistry>,

    /// Project creation/deletion tracking
    pub tracker: Arc<ProvisioningTracker>,

    /// Realtime channel state, advisory
    pub connection: Arc<ConnectionMonitor>,

    /// Durable state file
    pub state_file: Arc<StateFile>,
}

impl AppState {
    /// Initialize application state, restoring persisted environment caches
    pub async fn init(options: &AppOptions) -> Result<Self, ConsoleError> {
        info!("Initializing application state...");

        let gateway = match &options.gateway_api_token {
            Some(token) => GatewayClient::with_token(
                &options.gateway_base_url,
                SecretString::from(token.clone()),
            )?,
            None => GatewayClient::new(&options.gateway_base_url)?,
        };

        let state_file = Arc::new(StateFile::new(options.storage.layout.state_file()));

        let registry = Arc::new(ServiceRegistry::new());
        let persisted = state_file.load().await;
        registry.restore(persisted.environments);
        registry.set_active_environment(&options.environment_id);

        Ok(Self {
            gateway: Arc::new(gateway),
            registry,
            tracker: Arc::new(ProvisioningTracker::new()),
            connection: Arc::new(ConnectionMonitor::new()),
            state_file,
        })
    }

    /// Dispatch a control action on one service
    pub async fn service_action(
        &self,
        service: &str,
        action: ServiceAction,
        kind: ServiceKind,
    ) -> ActionResponse {
        self.registry
            .dispatch_service_action(service, action, kind, self.gateway.as_ref())
            .await
    }

    /// Dispatch a bulk action, then refresh explicitly: bulk operations
    /// register no jobs, so no event will reconcile them
    pub async fn global_action(&self, action: GlobalAction) -> ActionResponse {
        let outcome = self
            .registry
            .dispatch_global_action(action, self.gateway.as_ref())
            .await;
        if outcome.success {
            self.registry.fetch_services(self.gateway.as_ref()).await;
        }
        outcome
    }

    /// Create a project, tracking it optimistically from the moment of
    /// dispatch so progress shows with zero latency
    pub async fn create_project(&self, request: CreateProjectRequest) -> ProjectCommandResponse {
        let slug = slugify(&request.name);
        self.tracker.track_project(&slug);

        match self.gateway.create_project(&request).await {
            Ok(response) => {
                if !response.success {
                    self.tracker
                        .mark_project_failed(&slug, response.error.clone());
                } else if let Some(id) = response.project.as_ref().and_then(|p| p.id.as_ref()) {
                    self.tracker.set_project_id(&slug, id);
                }
                response
            }
            Err(e) => {
                let message = e.to_string();
                self.tracker.mark_project_failed(&slug, Some(message.clone()));
                ProjectCommandResponse {
                    success: false,
                    error: Some(message),
                    completed: false,
                    project: None,
                }
            }
        }
    }

    /// Delete a project. The gateway may finish synchronously (`completed`)
    /// or report progress through deletion events; both paths land in the
    /// tracker without double-counting.
    pub async fn delete_project(&self, slug: &str) -> ProjectCommandResponse {
        self.tracker.track_deletion(slug);

        match self.gateway.delete_project(slug).await {
            Ok(response) => {
                if !response.success {
                    self.tracker
                        .mark_deletion_failed(slug, response.error.clone());
                } else if response.completed {
                    self.tracker.mark_deletion_complete(slug);
                }
                response
            }
            Err(e) => {
                let message = e.to_string();
                self.tracker
                    .mark_deletion_failed(slug, Some(message.clone()));
                ProjectCommandResponse {
                    success: false,
                    error: Some(message),
                    completed: false,
                    project: None,
                }
            }
        }
    }

    /// Fetch the authoritative project list and merge it with tracked
    /// entries. Creations the list has confirmed ready are released;
    /// completed deletions are never cleared here, only annotated.
    pub async fn refresh_projects(&self) -> Result<Vec<ProjectEntry>, ConsoleError> {
        let list = self.gateway.list_projects().await?;

        for row in &list.projects {
            if self.tracker.project_status(&row.slug) == Some(ProvisionStatus::Ready) {
                self.tracker.clear_project(&row.slug);
            }
        }

        Ok(self.tracker.merge_with_list(&list.projects))
    }

    /// Shutdown application state, persisting the environment snapshot
    pub async fn shutdown(&self) -> Result<(), ConsoleError> {
        info!("Shutting down application state...");
        let state = PersistedState {
            environments: self.registry.snapshot(),
        };
        self.state_file.save(&state).await
    }
}
