//! Gateway response shapes
//!
//! All duck-typing tolerance for backend responses lives here. The rest of
//! the crate only ever sees the normalized types.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::project::Project;
use crate::models::service::{Service, ServiceKind, ServiceStatus};

/// A service entry as the gateway sends it, keyed by name in the parent map
#[derive(Debug, Clone, Deserialize)]
pub struct WireService {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub health: Option<String>,

    #[serde(default)]
    pub container: Option<String>,

    #[serde(default, rename = "type")]
    pub kind: ServiceKind,

    #[serde(default)]
    pub required: bool,
}

impl WireService {
    fn into_service(self, name: &str) -> Service {
        Service {
            name: name.to_string(),
            status: self
                .status
                .as_deref()
                .map(ServiceStatus::from)
                .unwrap_or(ServiceStatus::Stopped),
            health: self.health,
            container: self.container,
            kind: self.kind,
            required: self.required,
        }
    }
}

/// Full-status document.
///
/// The canonical shape is `{success, data: {services}}`. Two legacy shapes,
/// `{services}` and `{data: {services}}`, are still emitted by older gateway
/// builds; all three decode here and nowhere else.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusDocument {
    #[serde(default)]
    pub success: Option<bool>,

    #[serde(default)]
    pub data: Option<StatusData>,

    // Legacy top-level services map
    #[serde(default)]
    pub services: Option<HashMap<String, WireService>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    pub services: Option<HashMap<String, WireService>>,
}

impl StatusDocument {
    /// Union every shape into one normalized service map
    pub fn into_services(self) -> HashMap<String, Service> {
        let mut services = HashMap::new();

        if let Some(data) = self.data {
            if let Some(map) = data.services {
                for (name, wire) in map {
                    let service = wire.into_service(&name);
                    services.insert(name, service);
                }
            }
        }

        if let Some(map) = self.services {
            for (name, wire) in map {
                let service = wire.into_service(&name);
                services.insert(name, service);
            }
        }

        services
    }
}

/// Response to a single-service or bulk control action.
///
/// Doubles as the outcome type the registry hands back to callers; network
/// failures fold into a failed response rather than an error.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default, rename = "jobId", alias = "job_id")]
    pub job_id: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

impl ActionResponse {
    /// Build a failed outcome for a request that never reached the gateway
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            job_id: None,
            error: Some(error.into()),
        }
    }
}

/// State of a dispatched job, as reported by `GET jobs/{id}`
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Completed,
    Failed,

    /// Anything other than completed/failed means the job is still in flight
    #[serde(other)]
    Running,
}

/// Response to a job status recovery query
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobState,

    #[serde(default)]
    pub error: Option<String>,
}

/// Authoritative project list, normalized
#[derive(Debug, Clone)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub tld: Option<String>,
    pub default_php_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectListDocument {
    #[serde(default)]
    pub success: Option<bool>,

    pub data: ProjectListData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectListData {
    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub tld: Option<String>,

    #[serde(default)]
    pub default_php_version: Option<String>,
}

impl ProjectListDocument {
    pub fn into_list(self) -> ProjectList {
        ProjectList {
            projects: self.data.projects,
            tld: self.data.tld,
            default_php_version: self.data.default_php_version,
        }
    }
}

/// Response to a project create/delete command.
///
/// The gateway may finish the work synchronously (`completed: true`) or
/// acknowledge and report progress through realtime events.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCommandResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub project: Option<Project>,
}
