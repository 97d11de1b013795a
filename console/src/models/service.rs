//! Service models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime status of a service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Error,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for ServiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown service status: {}", s)),
        }
    }
}

impl From<&str> for ServiceStatus {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or(Self::Error)
    }
}

/// Backing unit kind for a service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Docker,
    Host,
}

impl Default for ServiceKind {
    fn default() -> Self {
        Self::Docker
    }
}

impl ServiceKind {
    /// Gateway path segment for service control endpoints
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::Docker => "services",
            Self::Host => "host-services",
        }
    }
}

/// Control action on a single service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
}

impl std::fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Restart => write!(f, "restart"),
            Self::Enable => write!(f, "enable"),
            Self::Disable => write!(f, "disable"),
        }
    }
}

/// Bulk action across every service in an environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GlobalAction {
    Start,
    Stop,
    Restart,
}

impl std::fmt::Display for GlobalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// A named control unit within one environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    /// Unique name within the environment
    pub name: String,

    /// Current status
    pub status: ServiceStatus,

    /// Optional health detail string
    #[serde(default)]
    pub health: Option<String>,

    /// Backing container id, when docker-backed
    #[serde(default)]
    pub container: Option<String>,

    /// Backing unit kind
    #[serde(default, rename = "type")]
    pub kind: ServiceKind,

    /// Required services cannot be removed from the environment
    #[serde(default)]
    pub required: bool,
}

/// One in-flight service control action
#[derive(Debug, Clone)]
pub struct PendingJob {
    /// Opaque, server-issued job id
    pub job_id: String,

    /// Service the action targets
    pub service: String,

    /// Dispatched action
    pub action: ServiceAction,

    /// When the gateway acknowledged the dispatch
    pub started_at: DateTime<Utc>,

    /// Sticky failure detail, set by a failure event and kept until dismissed
    pub error: Option<String>,
}

impl PendingJob {
    /// Create a job record for a freshly acknowledged dispatch
    pub fn new(job_id: impl Into<String>, service: impl Into<String>, action: ServiceAction) -> Self {
        Self {
            job_id: job_id.into(),
            service: service.into(),
            action,
            started_at: Utc::now(),
            error: None,
        }
    }
}
