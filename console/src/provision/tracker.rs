//! Provisioning tracker implementation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::models::project::Project;
use crate::provision::status::{DeletionStatus, ProvisionStatus};
use crate::realtime::events::{ProjectDeletionChanged, ProjectStatusChanged};

/// One in-flight project creation
#[derive(Debug, Clone)]
pub struct TrackedProject {
    pub slug: String,
    pub status: ProvisionStatus,
    pub error: Option<String>,
    pub project_id: Option<String>,
}

/// One in-flight project deletion
#[derive(Debug, Clone)]
pub struct TrackedDeletion {
    pub slug: String,
    pub status: DeletionStatus,
    pub error: Option<String>,
}

/// Merged row for display: authoritative project data overlaid with the
/// tracker's more recent view
#[derive(Debug, Clone)]
pub struct ProjectEntry {
    pub slug: String,

    /// Authoritative row, absent while the list hasn't caught up yet
    pub project: Option<Project>,

    /// Tracker state for an in-flight creation
    pub provision: Option<TrackedProject>,

    /// Tracker state for an in-flight deletion
    pub deletion: Option<TrackedDeletion>,

    /// Status badge to display, when one applies
    pub badge: Option<ProvisionStatus>,

    /// True when the row was synthesized from tracker state alone
    pub placeholder: bool,
}

/// Tracks project creation and deletion lifecycles.
///
/// The tracker owns the transient state the backend does not retain in a
/// client-queryable form between polls; during an active operation its view
/// takes precedence over the persisted row status.
pub struct ProvisioningTracker {
    projects: RwLock<HashMap<String, TrackedProject>>,
    deletions: RwLock<HashMap<String, TrackedDeletion>>,
    ready_count: AtomicU64,
    deleted_count: AtomicU64,
}

impl ProvisioningTracker {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            deletions: RwLock::new(HashMap::new()),
            ready_count: AtomicU64::new(0),
            deleted_count: AtomicU64::new(0),
        }
    }

    /// Begin tracking a creation, optimistically, before any network
    /// confirmation. A repeated call resets the entry for a fresh attempt.
    pub fn track_project(&self, slug: &str) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        projects.insert(
            slug.to_string(),
            TrackedProject {
                slug: slug.to_string(),
                status: ProvisionStatus::Queued,
                error: None,
                project_id: None,
            },
        );
    }

    /// The tracker's current view of a creation, if tracked
    pub fn project_status(&self, slug: &str) -> Option<ProvisionStatus> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects.get(slug).map(|p| p.status)
    }

    /// Full tracked entry for a creation
    pub fn project_entry(&self, slug: &str) -> Option<TrackedProject> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects.get(slug).cloned()
    }

    /// Apply a realtime creation event.
    ///
    /// Out-of-order protection: an event for an earlier stage than the
    /// recorded one is a no-op, except `failed`, which is always accepted.
    /// Events for slugs the tracker has never seen start a new entry, which
    /// covers a console restarted mid-provision.
    pub fn apply_project_event(&self, event: &ProjectStatusChanged) {
        let status: ProvisionStatus = match event.status.parse() {
            Ok(status) => status,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        match projects.get_mut(&event.slug) {
            Some(entry) => {
                if !entry.status.accepts(status) {
                    debug!(
                        "Ignoring stale {} event for {} (currently {})",
                        status, event.slug, entry.status
                    );
                    return;
                }
                entry.status = status;
                if let Some(error) = &event.error {
                    entry.error = Some(error.clone());
                }
            }
            None => {
                projects.insert(
                    event.slug.clone(),
                    TrackedProject {
                        slug: event.slug.clone(),
                        status,
                        error: event.error.clone(),
                        project_id: None,
                    },
                );
            }
        }

        if status == ProvisionStatus::Ready {
            self.ready_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Direct-call failure for a create request the gateway rejected
    /// outright, before any event could report it
    pub fn mark_project_failed(&self, slug: &str, error: Option<String>) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = projects.get_mut(slug) {
            if entry.status.accepts(ProvisionStatus::Failed) {
                entry.status = ProvisionStatus::Failed;
                if error.is_some() {
                    entry.error = error;
                }
            }
        }
    }

    /// Record the backend-assigned project id once known
    pub fn set_project_id(&self, slug: &str, project_id: &str) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = projects.get_mut(slug) {
            entry.project_id = Some(project_id.to_string());
        }
    }

    /// Stop tracking a creation (after the list confirms presence for
    /// `ready`, or on user dismissal for `failed`)
    pub fn clear_project(&self, slug: &str) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        projects.remove(slug);
    }

    /// Begin tracking a deletion
    pub fn track_deletion(&self, slug: &str) {
        let mut deletions = self.deletions.write().unwrap_or_else(|e| e.into_inner());
        deletions.insert(
            slug.to_string(),
            TrackedDeletion {
                slug: slug.to_string(),
                status: DeletionStatus::Deleting,
                error: None,
            },
        );
    }

    /// The tracker's current view of a deletion, if tracked
    pub fn deletion_status(&self, slug: &str) -> Option<DeletionStatus> {
        let deletions = self.deletions.read().unwrap_or_else(|e| e.into_inner());
        deletions.get(slug).map(|d| d.status)
    }

    /// Apply a realtime deletion event
    pub fn apply_deletion_event(&self, event: &ProjectDeletionChanged) {
        let status: DeletionStatus = match event.status.parse() {
            Ok(status) => status,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };

        self.advance_deletion(&event.slug, status, event.error.clone());
    }

    /// Direct-call completion for a synchronous delete response.
    ///
    /// Safe to call alongside event-driven completion: the transition guard
    /// makes the terminal bump happen once per slug, never twice.
    pub fn mark_deletion_complete(&self, slug: &str) {
        self.advance_deletion(slug, DeletionStatus::Deleted, None);
    }

    /// Direct-call failure for a synchronous delete response
    pub fn mark_deletion_failed(&self, slug: &str, error: Option<String>) {
        self.advance_deletion(slug, DeletionStatus::DeleteFailed, error);
    }

    fn advance_deletion(&self, slug: &str, status: DeletionStatus, error: Option<String>) {
        let mut deletions = self.deletions.write().unwrap_or_else(|e| e.into_inner());

        match deletions.get_mut(slug) {
            Some(entry) => {
                if !entry.status.accepts(status) {
                    debug!(
                        "Ignoring {} for {} (currently {})",
                        status, slug, entry.status
                    );
                    return;
                }
                entry.status = status;
                if error.is_some() {
                    entry.error = error;
                }
            }
            None => {
                deletions.insert(
                    slug.to_string(),
                    TrackedDeletion {
                        slug: slug.to_string(),
                        status,
                        error,
                    },
                );
            }
        }

        if status == DeletionStatus::Deleted {
            self.deleted_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Stop tracking a deletion, once the authoritative list no longer
    /// contains the slug (or the user dismisses a failure)
    pub fn clear_deletion(&self, slug: &str) {
        let mut deletions = self.deletions.write().unwrap_or_else(|e| e.into_inner());
        deletions.remove(slug);
    }

    /// Completed deletions whose slug the authoritative list has dropped;
    /// these are safe to clear
    pub fn clearable_deletions(&self, rows: &[Project]) -> Vec<String> {
        let deletions = self.deletions.read().unwrap_or_else(|e| e.into_inner());
        deletions
            .values()
            .filter(|d| d.status == DeletionStatus::Deleted)
            .filter(|d| !rows.iter().any(|p| p.slug == d.slug))
            .map(|d| d.slug.clone())
            .collect()
    }

    /// Times any slug has transitioned into `ready`. Monotonic; consumers
    /// use it to trigger a debounced list refresh.
    pub fn project_ready_count(&self) -> u64 {
        self.ready_count.load(Ordering::SeqCst)
    }

    /// Times any slug has transitioned into `deleted`. Monotonic.
    pub fn project_deleted_count(&self) -> u64 {
        self.deleted_count.load(Ordering::SeqCst)
    }

    /// Merge the authoritative list with tracked entries.
    ///
    /// Tracked status wins over the row's persisted status; a row status is
    /// badged only when it is a known in-progress value. Slugs present only
    /// in the tracker become placeholder rows so a just-created project
    /// never disappears during the gap before the list catches up.
    pub fn merge_with_list(&self, rows: &[Project]) -> Vec<ProjectEntry> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        let deletions = self.deletions.read().unwrap_or_else(|e| e.into_inner());

        let mut entries: Vec<ProjectEntry> = rows
            .iter()
            .map(|row| {
                let provision = projects.get(&row.slug).cloned();
                let badge = match &provision {
                    Some(tracked) => Some(tracked.status),
                    None => row
                        .status
                        .as_deref()
                        .and_then(|s| s.parse::<ProvisionStatus>().ok())
                        .filter(|s| s.is_in_progress()),
                };

                ProjectEntry {
                    slug: row.slug.clone(),
                    project: Some(row.clone()),
                    provision,
                    deletion: deletions.get(&row.slug).cloned(),
                    badge,
                    placeholder: false,
                }
            })
            .collect();

        for (slug, tracked) in projects.iter() {
            if rows.iter().any(|row| &row.slug == slug) {
                continue;
            }
            entries.push(ProjectEntry {
                slug: slug.clone(),
                project: None,
                provision: Some(tracked.clone()),
                deletion: deletions.get(slug).cloned(),
                badge: Some(tracked.status),
                placeholder: true,
            });
        }

        entries
    }
}

impl Default for ProvisioningTracker {
    fn default() -> Self {
        Self::new()
    }
}
