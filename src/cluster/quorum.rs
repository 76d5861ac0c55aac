//! Quorum witness reconciliation
//!
//! A file share witness cannot have its share path edited while quorum
//! is active on it. Moving to a new share therefore degrades quorum to
//! node majority first and then creates the witness again.

use super::action::Action;
use super::snapshot::ClusterSnapshot;
use crate::config::DesiredQuorumConfig;
use crate::error::{ClusterError, Result};
use serde::Serialize;

/// What has to happen to the quorum configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuorumAction {
    NoOp,
    /// Use a disk witness
    SetNodeAndDiskMajority { disk: String },
    /// Replace an existing file share witness pointing elsewhere
    ResetAndCreateWitness { path: String },
    /// Create a file share witness where none exists
    CreateWitness { path: String },
}

impl QuorumAction {
    /// Steps in execution order
    pub fn into_actions(self) -> Vec<Action> {
        match self {
            QuorumAction::NoOp => Vec::new(),
            QuorumAction::SetNodeAndDiskMajority { disk } => {
                vec![Action::SetNodeAndDiskMajority { disk }]
            }
            QuorumAction::ResetAndCreateWitness { path } => vec![
                Action::SetNodeMajority,
                Action::CreateFileShareWitness { path },
            ],
            QuorumAction::CreateWitness { path } => vec![Action::CreateFileShareWitness { path }],
        }
    }
}

/// Share paths are compared like Windows does: case-insensitive, ignoring
/// a trailing separator.
fn same_share(a: &str, b: &str) -> bool {
    let a = a.trim().trim_end_matches('\\');
    let b = b.trim().trim_end_matches('\\');
    a.eq_ignore_ascii_case(b)
}

/// Decides the witness change, if any
pub struct QuorumReconciler;

impl QuorumReconciler {
    /// Reject a config that asks for both a disk and a share witness
    pub fn check(desired: &DesiredQuorumConfig) -> Result<()> {
        if let (Some(disk), Some(path)) = (&desired.quorum_disk, &desired.fs_witness_path) {
            return Err(ClusterError::ConfigConflict(format!(
                "quorum disk {:?} and file share witness {:?} are mutually exclusive",
                disk, path
            )));
        }
        Ok(())
    }

    pub fn reconcile(desired: &DesiredQuorumConfig, snapshot: &ClusterSnapshot) -> Result<QuorumAction> {
        Self::check(desired)?;

        if let Some(disk) = &desired.quorum_disk {
            let current = snapshot.quorum.resource.as_deref();
            if current.is_some_and(|r| r.eq_ignore_ascii_case(disk)) {
                tracing::debug!("Quorum disk {} already configured", disk);
                return Ok(QuorumAction::NoOp);
            }
            return Ok(QuorumAction::SetNodeAndDiskMajority { disk: disk.clone() });
        }

        if let Some(path) = &desired.fs_witness_path {
            if !snapshot.has_file_share_witness() {
                return Ok(QuorumAction::CreateWitness { path: path.clone() });
            }
            return match snapshot.file_share_witness_path() {
                Some(current) if same_share(current, path) => {
                    tracing::debug!("File share witness already at {}", path);
                    Ok(QuorumAction::NoOp)
                }
                _ => Ok(QuorumAction::ResetAndCreateWitness { path: path.clone() }),
            };
        }

        Ok(QuorumAction::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_options_conflict() {
        let desired = DesiredQuorumConfig::new(Some("Cluster Disk 1"), Some("\\\\fs\\witness"));
        let result = QuorumReconciler::reconcile(&desired, &ClusterSnapshot::new());
        assert!(matches!(result, Err(ClusterError::ConfigConflict(_))));
    }

    #[test]
    fn test_disk_already_configured() {
        let snapshot = ClusterSnapshot::new().with_quorum_resource("Cluster Disk 1");
        let action = QuorumReconciler::reconcile(&DesiredQuorumConfig::disk("Cluster Disk 1"), &snapshot).unwrap();
        assert_eq!(action, QuorumAction::NoOp);
        assert!(action.into_actions().is_empty());
    }

    #[test]
    fn test_disk_changed() {
        let snapshot = ClusterSnapshot::new().with_quorum_resource("Cluster Disk 3");
        let action = QuorumReconciler::reconcile(&DesiredQuorumConfig::disk("Cluster Disk 1"), &snapshot).unwrap();
        assert_eq!(
            action.into_actions(),
            vec![Action::SetNodeAndDiskMajority {
                disk: "Cluster Disk 1".to_string()
            }]
        );
    }

    #[test]
    fn test_witness_rewrite() {
        let snapshot = ClusterSnapshot::new().with_file_share_witness("\\\\old\\share");
        let desired = DesiredQuorumConfig::file_share("\\\\new\\share");
        let actions = QuorumReconciler::reconcile(&desired, &snapshot).unwrap().into_actions();
        assert_eq!(
            actions,
            vec![
                Action::SetNodeMajority,
                Action::CreateFileShareWitness {
                    path: "\\\\new\\share".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_witness_noop() {
        let snapshot = ClusterSnapshot::new().with_file_share_witness("\\\\FS01\\Witness\\");
        let desired = DesiredQuorumConfig::file_share("\\\\fs01\\witness");
        let actions = QuorumReconciler::reconcile(&desired, &snapshot).unwrap().into_actions();
        assert!(actions.is_empty());
    }

    #[test]
    fn test_witness_created_directly() {
        let desired = DesiredQuorumConfig::file_share("\\\\new\\share");
        let action = QuorumReconciler::reconcile(&desired, &ClusterSnapshot::new()).unwrap();
        assert_eq!(
            action,
            QuorumAction::CreateWitness {
                path: "\\\\new\\share".to_string()
            }
        );
    }

    #[test]
    fn test_nothing_requested() {
        let action = QuorumReconciler::reconcile(&DesiredQuorumConfig::default(), &ClusterSnapshot::new()).unwrap();
        assert_eq!(action, QuorumAction::NoOp);
    }
}
