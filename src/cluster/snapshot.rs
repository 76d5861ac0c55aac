//! Point-in-time view of cluster state

use super::action::FILE_SHARE_WITNESS;
use crate::config::Credentials;
use crate::error::{ClusterError, Result};
use crate::exec::{quote, BoxedExecutor, CommandOutput};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Current quorum configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuorumState {
    /// Quorum type as reported by the cluster (e.g. `NodeAndDiskMajority`)
    pub quorum_type: Option<String>,
    /// Name of the witness resource, if any
    pub resource: Option<String>,
}

/// Cluster state captured once per reconciliation pass.
///
/// Cluster object names on Windows are case-insensitive, so every lookup
/// here compares ignoring ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterSnapshot {
    /// Name of the cluster, if one with the requested name exists
    pub cluster: Option<String>,
    /// Member node names
    pub members: BTreeSet<String>,
    /// Cluster resource names
    pub resources: BTreeSet<String>,
    /// Role name to existence
    pub roles: BTreeMap<String, bool>,
    /// Windows service name to display name
    pub service_display_names: BTreeMap<String, String>,
    /// Quorum configuration
    pub quorum: QuorumState,
    /// Share path of the file share witness resource
    pub witness_path: Option<String>,
}

fn contains_ignore_case<'a>(mut names: impl Iterator<Item = &'a String>, name: &str) -> bool {
    names.any(|n| n.eq_ignore_ascii_case(name))
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an existing cluster
    pub fn with_cluster(mut self, name: &str) -> Self {
        self.cluster = Some(name.to_string());
        self
    }

    /// Record a member node
    pub fn with_member(mut self, node: &str) -> Self {
        self.members.insert(node.to_string());
        self
    }

    /// Record a cluster resource
    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resources.insert(resource.to_string());
        self
    }

    /// Record a role and whether it exists
    pub fn with_role(mut self, role: &str, exists: bool) -> Self {
        self.roles.insert(role.to_string(), exists);
        self
    }

    /// Record a service's display name
    pub fn with_service(mut self, service: &str, display_name: &str) -> Self {
        self.service_display_names
            .insert(service.to_string(), display_name.to_string());
        self
    }

    /// Record the current witness resource
    pub fn with_quorum_resource(mut self, resource: &str) -> Self {
        self.quorum.resource = Some(resource.to_string());
        self
    }

    /// Record an existing file share witness at `path`
    pub fn with_file_share_witness(mut self, path: &str) -> Self {
        self.resources.insert(FILE_SHARE_WITNESS.to_string());
        self.quorum.quorum_type = Some("NodeAndFileShareMajority".to_string());
        self.quorum.resource = Some(FILE_SHARE_WITNESS.to_string());
        self.witness_path = Some(path.to_string());
        self
    }

    pub fn cluster_exists(&self, name: &str) -> bool {
        self.cluster
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn has_member(&self, node: &str) -> bool {
        contains_ignore_case(self.members.iter(), node)
    }

    pub fn has_resource(&self, resource: &str) -> bool {
        contains_ignore_case(self.resources.iter(), resource)
    }

    pub fn role_exists(&self, role: &str) -> bool {
        self.roles
            .iter()
            .any(|(name, exists)| *exists && name.eq_ignore_ascii_case(role))
    }

    /// Display name of a Windows service, when it was looked up
    pub fn display_name(&self, service: &str) -> Option<&str> {
        self.service_display_names
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(service))
            .map(|(_, display)| display.as_str())
    }

    pub fn has_file_share_witness(&self) -> bool {
        self.has_resource(FILE_SHARE_WITNESS)
    }

    /// Share path of the file share witness, if the resource exists
    pub fn file_share_witness_path(&self) -> Option<&str> {
        if self.has_file_share_witness() {
            self.witness_path.as_deref()
        } else {
            None
        }
    }

    /// Apply the effect of a successful cluster creation
    pub fn record_cluster_created(&mut self, name: &str, node: &str) {
        self.cluster = Some(name.to_string());
        self.members.insert(node.to_string());
    }

    /// Apply the effect of a successful join
    pub fn record_joined(&mut self, node: &str) {
        self.members.insert(node.to_string());
    }
}

/// What a pass needs to know about the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotScope {
    /// Cluster to look for
    pub cluster_name: String,
    /// Role whose existence to check
    pub role_name: Option<String>,
    /// Services whose display names to look up
    pub services: Vec<String>,
    /// Read quorum configuration
    pub quorum: bool,
}

impl SnapshotScope {
    pub fn new(cluster_name: &str) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role_name: &str, primary_service: &str) -> Self {
        self.role_name = Some(role_name.to_string());
        self.services = vec![primary_service.to_string()];
        self
    }

    pub fn quorum(mut self) -> Self {
        self.quorum = true;
        self
    }
}

/// Reads cluster state through the command executor. Never mutates.
///
/// Every query is best-effort: a read that runs and fails (for example
/// `Get-Cluster` on a node that is not clustered yet) is treated as empty
/// output. A read that cannot be started is an error, since an empty
/// snapshot would otherwise drive the node toward creating a new cluster.
pub struct ClusterStateProbe {
    executor: BoxedExecutor,
    credentials: Credentials,
}

impl ClusterStateProbe {
    pub fn new(executor: BoxedExecutor, credentials: Credentials) -> Self {
        Self { executor, credentials }
    }

    fn read(&self, query: &str) -> Result<CommandOutput> {
        self.executor
            .run_best_effort(query, &self.credentials)
            .map_err(|source| ClusterError::Probe {
                query: query.to_string(),
                source,
            })
    }

    fn value(&self, query: &str) -> Result<String> {
        Ok(self.read(query)?.value().to_string())
    }

    fn lines(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.read(query)?.lines())
    }

    /// Capture the state described by `scope`
    pub fn capture(&self, scope: &SnapshotScope) -> Result<ClusterSnapshot> {
        let mut snapshot = ClusterSnapshot::new();

        let found = self.value(&format!("(Get-Cluster -Name {}).Name", quote(&scope.cluster_name)))?;
        if !found.is_empty() && found.eq_ignore_ascii_case(&scope.cluster_name) {
            snapshot.cluster = Some(found);
            snapshot.members = self.lines("(Get-ClusterNode).Name")?.into_iter().collect();
            snapshot.resources = self.lines("(Get-ClusterResource).Name")?.into_iter().collect();
        }

        if let Some(role) = &scope.role_name {
            let group = self.value(&format!("(Get-ClusterGroup -Name {}).Name", quote(role)))?;
            snapshot.roles.insert(role.clone(), !group.is_empty());
        }

        for service in &scope.services {
            let display = self.value(&format!("(Get-Service -Name {}).DisplayName", quote(service)))?;
            if !display.is_empty() {
                snapshot.service_display_names.insert(service.clone(), display);
            }
        }

        if scope.quorum && snapshot.cluster.is_some() {
            snapshot.quorum = QuorumState {
                quorum_type: non_empty(self.value("(Get-ClusterQuorum).QuorumType")?),
                resource: non_empty(self.value("(Get-ClusterQuorum).QuorumResource.Name")?),
            };
            if snapshot.has_file_share_witness() {
                snapshot.witness_path = non_empty(self.value(&format!(
                    "(Get-ClusterResource -Name {} | Get-ClusterParameter -Name SharePath).Value",
                    quote(FILE_SHARE_WITNESS)
                ))?);
            }
        }

        tracing::debug!(
            cluster = ?snapshot.cluster,
            members = snapshot.members.len(),
            resources = snapshot.resources.len(),
            "captured cluster snapshot"
        );
        Ok(snapshot)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
