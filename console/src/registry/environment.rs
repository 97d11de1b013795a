//! Per-environment service cache

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::service::{PendingJob, Service};

/// A cache (or a pending job) older than this is not trusted
pub const STALENESS_THRESHOLD_SECS: i64 = 300;

/// Cached view of one environment's services and in-flight jobs
#[derive(Debug, Clone, Default)]
pub struct EnvironmentCache {
    /// Services keyed by name
    pub services: HashMap<String, Service>,

    /// In-flight jobs keyed by server-issued job id
    pub pending_jobs: HashMap<String, PendingJob>,

    /// When the services map was last replaced or patched
    pub last_updated: Option<DateTime<Utc>>,
}

impl EnvironmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A never-fetched or aged-out cache must be refreshed before it is
    /// trusted for display.
    pub fn is_stale(&self) -> bool {
        match self.last_updated {
            Some(at) => Utc::now() - at > Duration::seconds(STALENESS_THRESHOLD_SECS),
            None => true,
        }
    }

    /// Durable projection of this cache: services and freshness only.
    /// Pending jobs are session-scoped and rebuilt by the recovery sweep.
    pub fn to_persisted(&self) -> PersistedEnvironment {
        PersistedEnvironment {
            services: self.services.clone(),
            last_updated: self.last_updated,
        }
    }
}

impl From<PersistedEnvironment> for EnvironmentCache {
    fn from(persisted: PersistedEnvironment) -> Self {
        Self {
            services: persisted.services,
            pending_jobs: HashMap::new(),
            last_updated: persisted.last_updated,
        }
    }
}

/// The slice of an environment cache that survives a restart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEnvironment {
    pub services: HashMap<String, Service>,

    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary() {
        let mut cache = EnvironmentCache::new();
        assert!(cache.is_stale());

        cache.last_updated = Some(Utc::now() - Duration::minutes(6));
        assert!(cache.is_stale());

        cache.last_updated = Some(Utc::now() - Duration::minutes(4));
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_persisted_projection_drops_jobs() {
        let mut cache = EnvironmentCache::new();
        cache.pending_jobs.insert(
            "j1".to_string(),
            crate::models::service::PendingJob::new(
                "j1",
                "redis",
                crate::models::service::ServiceAction::Start,
            ),
        );
        cache.last_updated = Some(Utc::now());

        let restored = EnvironmentCache::from(cache.to_persisted());
        assert!(restored.pending_jobs.is_empty());
        assert_eq!(restored.last_updated, cache.last_updated);
    }
}
