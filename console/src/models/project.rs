//! Project models

use serde::{Deserialize, Serialize};

/// A project row as returned by the gateway's authoritative list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Backend-assigned id, absent while the row is still being created
    #[serde(default)]
    pub id: Option<String>,

    /// Stable identifier derived from the name
    pub slug: String,

    /// Display name
    pub name: String,

    /// Raw status column; only known in-progress values are meaningful
    /// to the console (see `provision::status`)
    #[serde(default)]
    pub status: Option<String>,

    /// PHP version the project runs on
    #[serde(default)]
    pub php_version: Option<String>,

    /// Repository URL the project was created from
    #[serde(default)]
    pub repository: Option<String>,

    /// Filesystem path on the host
    #[serde(default)]
    pub path: Option<String>,
}

/// Request body for creating a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,

    /// Create the project inside a named workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}
