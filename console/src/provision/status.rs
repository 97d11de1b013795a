//! Provisioning and deletion status machines

use serde::{Deserialize, Serialize};

/// Creation lifecycle stage.
///
/// The ordering is total: a status is superseded only by a later one, or by
/// `Failed` from anywhere. `Forking` and `CreatingRepo` are alternatives for
/// the same stage and share a rank.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    Queued,
    Provisioning,
    ValidatingPackage,
    CreatingProject,
    Forking,
    CreatingRepo,
    Cloning,
    SettingUp,
    InstallingComposer,
    InstallingNpm,
    Building,
    Finalizing,
    Ready,
    Failed,
}

impl ProvisionStatus {
    /// Position in the creation pipeline
    pub fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Provisioning => 1,
            Self::ValidatingPackage => 2,
            Self::CreatingProject => 3,
            Self::Forking | Self::CreatingRepo => 4,
            Self::Cloning => 5,
            Self::SettingUp => 6,
            Self::InstallingComposer => 7,
            Self::InstallingNpm => 8,
            Self::Building => 9,
            Self::Finalizing => 10,
            Self::Ready => 11,
            Self::Failed => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Whether this status still marks work in flight. Only these values
    /// are worth a status badge when read back off an authoritative row.
    pub fn is_in_progress(&self) -> bool {
        !self.is_terminal()
    }

    /// Decide whether `next` supersedes `self`.
    ///
    /// An earlier-stage event arriving late is a no-op; `Failed` is accepted
    /// from any non-failed state; nothing leaves `Failed`.
    pub fn accepts(&self, next: ProvisionStatus) -> bool {
        if *self == Self::Failed {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Provisioning => "provisioning",
            Self::ValidatingPackage => "validating_package",
            Self::CreatingProject => "creating_project",
            Self::Forking => "forking",
            Self::CreatingRepo => "creating_repo",
            Self::Cloning => "cloning",
            Self::SettingUp => "setting_up",
            Self::InstallingComposer => "installing_composer",
            Self::InstallingNpm => "installing_npm",
            Self::Building => "building",
            Self::Finalizing => "finalizing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ProvisionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "provisioning" => Ok(Self::Provisioning),
            "validating_package" => Ok(Self::ValidatingPackage),
            "creating_project" => Ok(Self::CreatingProject),
            "forking" => Ok(Self::Forking),
            "creating_repo" => Ok(Self::CreatingRepo),
            "cloning" => Ok(Self::Cloning),
            "setting_up" => Ok(Self::SettingUp),
            "installing_composer" => Ok(Self::InstallingComposer),
            "installing_npm" => Ok(Self::InstallingNpm),
            "building" => Ok(Self::Building),
            "finalizing" => Ok(Self::Finalizing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown provisioning status: {}", s)),
        }
    }
}

/// Deletion lifecycle stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Deleting,
    RemovingFiles,
    Deleted,
    DeleteFailed,
}

impl DeletionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::DeleteFailed)
    }

    /// Decide whether `next` supersedes `self`.
    ///
    /// `Deleted` is reachable only from `Deleting` or `RemovingFiles`;
    /// `DeleteFailed` is reachable from both in-flight stages. Terminal
    /// states accept nothing: a completed deletion stays visible until
    /// explicitly cleared, and a failed one until retried.
    pub fn accepts(&self, next: DeletionStatus) -> bool {
        match (self, next) {
            (Self::Deleted | Self::DeleteFailed, _) => false,
            (_, Self::DeleteFailed) => true,
            (Self::Deleting, Self::RemovingFiles) => true,
            (Self::Deleting | Self::RemovingFiles, Self::Deleted) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deleting => "deleting",
            Self::RemovingFiles => "removing_files",
            Self::Deleted => "deleted",
            Self::DeleteFailed => "delete_failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DeletionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deleting" => Ok(Self::Deleting),
            "removing_files" => Ok(Self::RemovingFiles),
            "deleted" => Ok(Self::Deleted),
            "delete_failed" => Ok(Self::DeleteFailed),
            _ => Err(format!("Unknown deletion status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_accepted() {
        assert!(ProvisionStatus::Queued.accepts(ProvisionStatus::Provisioning));
        assert!(ProvisionStatus::Cloning.accepts(ProvisionStatus::Building));
        assert!(ProvisionStatus::Finalizing.accepts(ProvisionStatus::Ready));
    }

    #[test]
    fn test_regressions_rejected() {
        assert!(!ProvisionStatus::Building.accepts(ProvisionStatus::Cloning));
        assert!(!ProvisionStatus::Ready.accepts(ProvisionStatus::Finalizing));
        // Duplicates and stage alternatives are no-ops, not regressions
        assert!(!ProvisionStatus::Cloning.accepts(ProvisionStatus::Cloning));
        assert!(!ProvisionStatus::Forking.accepts(ProvisionStatus::CreatingRepo));
    }

    #[test]
    fn test_failed_absorbs_from_anywhere() {
        assert!(ProvisionStatus::Queued.accepts(ProvisionStatus::Failed));
        assert!(ProvisionStatus::Building.accepts(ProvisionStatus::Failed));
        assert!(ProvisionStatus::Ready.accepts(ProvisionStatus::Failed));
        // ...and nothing leaves it
        assert!(!ProvisionStatus::Failed.accepts(ProvisionStatus::Cloning));
        assert!(!ProvisionStatus::Failed.accepts(ProvisionStatus::Ready));
        assert!(!ProvisionStatus::Failed.accepts(ProvisionStatus::Failed));
    }

    #[test]
    fn test_wire_round_trip() {
        for s in ["validating_package", "installing_composer", "creating_repo"] {
            let status: ProvisionStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("compiling".parse::<ProvisionStatus>().is_err());
    }

    #[test]
    fn test_deletion_transitions() {
        assert!(DeletionStatus::Deleting.accepts(DeletionStatus::RemovingFiles));
        assert!(DeletionStatus::Deleting.accepts(DeletionStatus::Deleted));
        assert!(DeletionStatus::RemovingFiles.accepts(DeletionStatus::Deleted));
        assert!(DeletionStatus::Deleting.accepts(DeletionStatus::DeleteFailed));
        assert!(DeletionStatus::RemovingFiles.accepts(DeletionStatus::DeleteFailed));

        assert!(!DeletionStatus::RemovingFiles.accepts(DeletionStatus::Deleting));
        assert!(!DeletionStatus::Deleted.accepts(DeletionStatus::DeleteFailed));
        assert!(!DeletionStatus::Deleted.accepts(DeletionStatus::Deleting));
        assert!(!DeletionStatus::DeleteFailed.accepts(DeletionStatus::Deleted));
    }
}
