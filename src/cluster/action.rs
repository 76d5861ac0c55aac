//! Mutating cluster actions and their PowerShell rendering

use crate::exec::{quote, ExecMode};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;

/// Name of the cluster resource backing a file share witness
pub const FILE_SHARE_WITNESS: &str = "File Share Witness";

/// Resource type used for secondary services
pub const GENERIC_SERVICE: &str = "Generic Service";

/// One mutating step against the cluster control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Form a new cluster with the local node as its only member
    CreateCluster {
        name: String,
        node: String,
        ip: IpAddr,
        force: bool,
    },
    /// Add the local node to an existing cluster
    JoinCluster { cluster: String, node: String },
    /// Absorb any disks visible to the cluster
    AddAvailableDisks,
    /// Use the given cluster disk as witness
    SetNodeAndDiskMajority { disk: String },
    /// Drop the witness and rely on node votes only
    SetNodeMajority,
    /// Use the given share as witness
    CreateFileShareWitness { path: String },
    /// Create the role around its primary service
    CreateGenericServiceRole {
        role: String,
        service: String,
        static_address: Option<IpAddr>,
        storage: Option<String>,
        checkpoint_keys: Vec<String>,
    },
    /// Add a secondary service resource to a role
    AddClusterResource {
        service: String,
        resource_type: String,
        group: String,
    },
    /// Make a secondary service depend on the role
    SetResourceDependency { service: String, depends_on: String },
    /// Bind a secondary service resource to its Windows service
    SetResourceParameters { service: String, use_network_name: bool },
    /// Bring a secondary service resource online
    StartClusterResource { service: String },
}

impl Action {
    /// Short step name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateCluster { .. } => "create-cluster",
            Action::JoinCluster { .. } => "join-cluster",
            Action::AddAvailableDisks => "add-available-disks",
            Action::SetNodeAndDiskMajority { .. } => "set-node-and-disk-majority",
            Action::SetNodeMajority => "set-node-majority",
            Action::CreateFileShareWitness { .. } => "create-file-share-witness",
            Action::CreateGenericServiceRole { .. } => "create-generic-service-role",
            Action::AddClusterResource { .. } => "add-cluster-resource",
            Action::SetResourceDependency { .. } => "set-resource-dependency",
            Action::SetResourceParameters { .. } => "set-resource-parameters",
            Action::StartClusterResource { .. } => "start-cluster-resource",
        }
    }

    /// Cluster object the step acts on
    pub fn resource(&self) -> &str {
        match self {
            Action::CreateCluster { name, .. } => name,
            Action::JoinCluster { cluster, .. } => cluster,
            Action::AddAvailableDisks => "available disks",
            Action::SetNodeAndDiskMajority { .. } | Action::SetNodeMajority => "quorum",
            Action::CreateFileShareWitness { .. } => FILE_SHARE_WITNESS,
            Action::CreateGenericServiceRole { role, .. } => role,
            Action::AddClusterResource { service, .. }
            | Action::SetResourceDependency { service, .. }
            | Action::SetResourceParameters { service, .. }
            | Action::StartClusterResource { service } => service,
        }
    }

    /// Disk absorption is the only step whose failure is tolerated
    pub fn mode(&self) -> ExecMode {
        match self {
            Action::AddAvailableDisks => ExecMode::BestEffort,
            _ => ExecMode::FailFast,
        }
    }

    /// PowerShell command implementing the step
    pub fn script(&self) -> String {
        match self {
            Action::CreateCluster { name, node, ip, force } => {
                let mut script = format!(
                    "New-Cluster -Name {} -Node {} -StaticAddress {}",
                    quote(name),
                    quote(node),
                    ip
                );
                if *force {
                    script.push_str(" -Force");
                }
                script
            }
            Action::JoinCluster { cluster, node } => {
                format!("Add-ClusterNode -Cluster {} -Name {}", quote(cluster), quote(node))
            }
            Action::AddAvailableDisks => "Get-ClusterAvailableDisk | Add-ClusterDisk".to_string(),
            Action::SetNodeAndDiskMajority { disk } => {
                format!("Set-ClusterQuorum -NodeAndDiskMajority {}", quote(disk))
            }
            Action::SetNodeMajority => "Set-ClusterQuorum -NodeMajority".to_string(),
            Action::CreateFileShareWitness { path } => {
                format!("Set-ClusterQuorum -NodeAndFileShareMajority {}", quote(path))
            }
            Action::CreateGenericServiceRole {
                role,
                service,
                static_address,
                storage,
                checkpoint_keys,
            } => {
                let mut script = format!(
                    "Add-ClusterGenericServiceRole -ServiceName {} -Name {}",
                    quote(service),
                    quote(role)
                );
                if let Some(ip) = static_address {
                    script.push_str(&format!(" -StaticAddress {}", ip));
                }
                if let Some(storage) = storage {
                    script.push_str(&format!(" -Storage {}", quote(storage)));
                }
                if !checkpoint_keys.is_empty() {
                    let keys: Vec<String> = checkpoint_keys.iter().map(|k| quote(k)).collect();
                    script.push_str(&format!(" -CheckpointKey {}", keys.join(", ")));
                }
                script
            }
            Action::AddClusterResource {
                service,
                resource_type,
                group,
            } => format!(
                "Add-ClusterResource -Name {} -ResourceType {} -Group {}",
                quote(service),
                quote(resource_type),
                quote(group)
            ),
            Action::SetResourceDependency { service, depends_on } => format!(
                "Set-ClusterResourceDependency -Resource {} -Dependency {}",
                quote(service),
                quote(&format!("[{}]", depends_on))
            ),
            Action::SetResourceParameters {
                service,
                use_network_name,
            } => format!(
                "Get-ClusterResource -Name {} | Set-ClusterParameter -Multiple @{{'ServiceName'={};'UseNetworkName'={}}}",
                quote(service),
                quote(service),
                u8::from(*use_network_name)
            ),
            Action::StartClusterResource { service } => {
                format!("Start-ClusterResource -Name {}", quote(service))
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.resource())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cluster_script() {
        let action = Action::CreateCluster {
            name: "CLUS1".to_string(),
            node: "NODE1".to_string(),
            ip: "10.0.0.5".parse().unwrap(),
            force: true,
        };
        assert_eq!(
            action.script(),
            "New-Cluster -Name 'CLUS1' -Node 'NODE1' -StaticAddress 10.0.0.5 -Force"
        );
        assert_eq!(action.mode(), ExecMode::FailFast);
        assert_eq!(action.to_string(), "create-cluster (CLUS1)");
    }

    #[test]
    fn test_disk_absorption_is_best_effort() {
        assert_eq!(Action::AddAvailableDisks.mode(), ExecMode::BestEffort);
        assert_eq!(
            Action::AddAvailableDisks.script(),
            "Get-ClusterAvailableDisk | Add-ClusterDisk"
        );
    }

    #[test]
    fn test_generic_service_role_script() {
        let action = Action::CreateGenericServiceRole {
            role: "APP".to_string(),
            service: "AppSvc".to_string(),
            static_address: Some("10.0.0.6".parse().unwrap()),
            storage: Some("Cluster Disk 2".to_string()),
            checkpoint_keys: vec!["SOFTWARE\\App".to_string(), "SOFTWARE\\App2".to_string()],
        };
        assert_eq!(
            action.script(),
            "Add-ClusterGenericServiceRole -ServiceName 'AppSvc' -Name 'APP' -StaticAddress 10.0.0.6 \
             -Storage 'Cluster Disk 2' -CheckpointKey 'SOFTWARE\\App', 'SOFTWARE\\App2'"
        );

        let bare = Action::CreateGenericServiceRole {
            role: "APP".to_string(),
            service: "AppSvc".to_string(),
            static_address: None,
            storage: None,
            checkpoint_keys: Vec::new(),
        };
        assert_eq!(bare.script(), "Add-ClusterGenericServiceRole -ServiceName 'AppSvc' -Name 'APP'");
    }

    #[test]
    fn test_secondary_service_scripts() {
        let dependency = Action::SetResourceDependency {
            service: "Worker".to_string(),
            depends_on: "APP".to_string(),
        };
        assert_eq!(
            dependency.script(),
            "Set-ClusterResourceDependency -Resource 'Worker' -Dependency '[APP]'"
        );

        let params = Action::SetResourceParameters {
            service: "Worker".to_string(),
            use_network_name: true,
        };
        assert_eq!(
            params.script(),
            "Get-ClusterResource -Name 'Worker' | Set-ClusterParameter -Multiple @{'ServiceName'='Worker';'UseNetworkName'=1}"
        );
    }

    #[test]
    fn test_quorum_scripts() {
        assert_eq!(Action::SetNodeMajority.script(), "Set-ClusterQuorum -NodeMajority");
        let witness = Action::CreateFileShareWitness {
            path: "\\\\fs01\\witness".to_string(),
        };
        assert_eq!(
            witness.script(),
            "Set-ClusterQuorum -NodeAndFileShareMajority '\\\\fs01\\witness'"
        );
    }

    #[test]
    fn test_serialize_tagged() {
        let json = serde_json::to_value(Action::StartClusterResource {
            service: "Worker".to_string(),
        })
        .unwrap();
        assert_eq!(json["action"], "start_cluster_resource");
        assert_eq!(json["service"], "Worker");
    }
}
