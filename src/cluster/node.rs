//! Cluster membership reconciliation

use super::action::Action;
use super::snapshot::ClusterSnapshot;
use crate::config::DesiredNodeConfig;
use serde::Serialize;

/// What has to happen for the local node to be a cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAction {
    /// No cluster with the desired name: form it here
    Create,
    /// Cluster exists without this node: join it
    Join,
    /// Already a member
    NoOp,
}

/// Decides between forming, joining, or leaving the cluster alone
pub struct NodeReconciler;

impl NodeReconciler {
    pub fn reconcile(desired: &DesiredNodeConfig, snapshot: &ClusterSnapshot, local_node: &str) -> NodeAction {
        if !snapshot.cluster_exists(&desired.cluster_name) {
            NodeAction::Create
        } else if !snapshot.has_member(local_node) {
            NodeAction::Join
        } else {
            NodeAction::NoOp
        }
    }

    /// Steps for `action`, in execution order.
    ///
    /// Disk absorption follows creation and is repeated on every pass
    /// where the node already belongs to the cluster; a joining node leaves
    /// disks to the node that formed the cluster.
    pub fn actions(desired: &DesiredNodeConfig, action: &NodeAction, local_node: &str) -> Vec<Action> {
        match action {
            NodeAction::Create => vec![
                Action::CreateCluster {
                    name: desired.cluster_name.clone(),
                    node: local_node.to_string(),
                    ip: desired.cluster_ip,
                    force: true,
                },
                Action::AddAvailableDisks,
            ],
            NodeAction::Join => vec![Action::JoinCluster {
                cluster: desired.cluster_name.clone(),
                node: local_node.to_string(),
            }],
            NodeAction::NoOp => vec![Action::AddAvailableDisks],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired() -> DesiredNodeConfig {
        DesiredNodeConfig::new("CLUS1", "10.0.0.5", true).unwrap()
    }

    #[test]
    fn test_create_when_cluster_missing() {
        let snapshot = ClusterSnapshot::new();
        let action = NodeReconciler::reconcile(&desired(), &snapshot, "NODE1");
        assert_eq!(action, NodeAction::Create);

        let actions = NodeReconciler::actions(&desired(), &action, "NODE1");
        assert_eq!(
            actions,
            vec![
                Action::CreateCluster {
                    name: "CLUS1".to_string(),
                    node: "NODE1".to_string(),
                    ip: "10.0.0.5".parse().unwrap(),
                    force: true,
                },
                Action::AddAvailableDisks,
            ]
        );
    }

    #[test]
    fn test_create_when_other_cluster_found() {
        let snapshot = ClusterSnapshot::new().with_cluster("OTHER").with_member("NODE1");
        assert_eq!(NodeReconciler::reconcile(&desired(), &snapshot, "NODE1"), NodeAction::Create);
    }

    #[test]
    fn test_join_when_not_member() {
        let snapshot = ClusterSnapshot::new().with_cluster("CLUS1").with_member("NODE1");
        let action = NodeReconciler::reconcile(&desired(), &snapshot, "NODE2");
        assert_eq!(action, NodeAction::Join);
        assert_eq!(
            NodeReconciler::actions(&desired(), &action, "NODE2"),
            vec![Action::JoinCluster {
                cluster: "CLUS1".to_string(),
                node: "NODE2".to_string(),
            }]
        );
    }

    #[test]
    fn test_noop_is_idempotent() {
        let snapshot = ClusterSnapshot::new().with_cluster("CLUS1").with_member("NODE1");
        let first = NodeReconciler::reconcile(&desired(), &snapshot, "NODE1");
        let second = NodeReconciler::reconcile(&desired(), &snapshot, "NODE1");
        assert_eq!(first, NodeAction::NoOp);
        assert_eq!(second, NodeAction::NoOp);
        assert_eq!(
            NodeReconciler::actions(&desired(), &first, "NODE1"),
            vec![Action::AddAvailableDisks]
        );
    }
}
