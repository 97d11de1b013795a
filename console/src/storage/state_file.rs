//! Durable console state
//!
//! Only the environments field persists across restarts. Pending jobs and
//! provisioning trackers are session-scoped and rebuilt by the recovery
//! sweep on reload.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::ConsoleError;
use crate::registry::environment::PersistedEnvironment;

/// The document stored under the console's fixed state path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub environments: HashMap<String, PersistedEnvironment>,
}

/// Durable state file with atomic writes
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted state; a missing or unreadable file yields the
    /// empty default
    pub async fn load(&self) -> PersistedState {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Discarding unreadable state file: {}", e);
                    PersistedState::default()
                }
            },
            Err(_) => PersistedState::default(),
        }
    }

    /// Atomic write using a temporary file
    pub async fn save(&self, state: &PersistedState) -> Result<(), ConsoleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(state)?;
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::service::{Service, ServiceKind, ServiceStatus};

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let file = StateFile::new("/nonexistent/orbit/state.json");
        let state = file.load().await;
        assert!(state.environments.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_restore_environments() {
        let path = std::env::temp_dir()
            .join(format!("orbit-state-{}", uuid::Uuid::new_v4()))
            .join("state.json");
        let file = StateFile::new(&path);

        let mut services = HashMap::new();
        services.insert(
            "caddy".to_string(),
            Service {
                name: "caddy".to_string(),
                status: ServiceStatus::Running,
                health: None,
                container: Some("orbit-caddy".to_string()),
                kind: ServiceKind::Docker,
                required: true,
            },
        );
        let mut state = PersistedState::default();
        state.environments.insert(
            "local".to_string(),
            PersistedEnvironment {
                services,
                last_updated: Some(Utc::now()),
            },
        );

        file.save(&state).await.unwrap();
        let loaded = file.load().await;

        let environment = &loaded.environments["local"];
        assert_eq!(
            environment.services["caddy"].status,
            ServiceStatus::Running
        );
        assert!(environment.last_updated.is_some());

        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
