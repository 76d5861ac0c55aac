//! Generic service role reconciliation

use super::action::{Action, GENERIC_SERVICE};
use super::snapshot::ClusterSnapshot;
use crate::config::DesiredServiceRole;

/// Computes the steps that build a generic service role.
///
/// Only the role name is checked for idempotency. An existing role is left
/// alone even if its secondary services differ from the desired list.
pub struct ServiceRoleReconciler;

impl ServiceRoleReconciler {
    pub fn reconcile(desired: &DesiredServiceRole, snapshot: &ClusterSnapshot, local_node: &str) -> Vec<Action> {
        if snapshot.role_exists(&desired.role_name) {
            tracing::debug!("Role {} already exists", desired.role_name);
            return Vec::new();
        }

        let mut actions = Vec::with_capacity(1 + 4 * desired.services.secondaries().len());
        let primary = desired.services.primary();

        // The primary service's resource may already exist under another role name.
        let resource_present = snapshot
            .display_name(primary)
            .is_some_and(|display| snapshot.has_resource(display));

        if snapshot.has_member(local_node) && !resource_present {
            actions.push(Action::CreateGenericServiceRole {
                role: desired.role_name.clone(),
                service: primary.to_string(),
                static_address: Some(desired.service_ip),
                storage: desired.storage.clone(),
                checkpoint_keys: desired.checkpoint_keys.clone(),
            });
        } else {
            tracing::debug!(
                "Skipping creation of role {}: member={}, resource present={}",
                desired.role_name,
                snapshot.has_member(local_node),
                resource_present
            );
        }

        for service in desired.services.secondaries() {
            actions.extend(Self::secondary_steps(&desired.role_name, service));
        }

        actions
    }

    /// The four steps attaching one secondary service, in order
    fn secondary_steps(role: &str, service: &str) -> [Action; 4] {
        [
            Action::AddClusterResource {
                service: service.to_string(),
                resource_type: GENERIC_SERVICE.to_string(),
                group: role.to_string(),
            },
            Action::SetResourceDependency {
                service: service.to_string(),
                depends_on: role.to_string(),
            },
            Action::SetResourceParameters {
                service: service.to_string(),
                use_network_name: true,
            },
            Action::StartClusterResource {
                service: service.to_string(),
            },
        ]
    }
}
