//! Desired-state configuration types
//!
//! Every constructor here validates its input, so a value of one of these
//! types is always safe to hand to a reconciler.

use crate::error::{ClusterError, Result};
use serde::Serialize;
use std::net::IpAddr;

/// Windows features required on every cluster node
pub const BASE_FEATURES: [&str; 2] = ["Failover-Clustering", "RSAT-Clustering-Powershell"];

/// Failover Cluster Manager and friends, installed when tools are requested
pub const TOOLS_FEATURE: &str = "RSAT-Clustering-Mgmt";

/// Parse an IPv4 or IPv6 address
pub fn parse_ip(field: &str, value: &str) -> Result<IpAddr> {
    value.trim().parse::<IpAddr>().map_err(|_| {
        ClusterError::Validation(format!("{} must be a valid IP address, got {:?}", field, value))
    })
}

fn required_name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ClusterError::Validation(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

fn optional_value(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Desired cluster membership for the local node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredNodeConfig {
    /// Cluster name
    pub cluster_name: String,
    /// Static address of the cluster name resource
    pub cluster_ip: IpAddr,
    /// Also install the management tools feature
    pub install_tools: bool,
}

impl DesiredNodeConfig {
    /// Create a node config, validating the name and address
    pub fn new(cluster_name: &str, cluster_ip: &str, install_tools: bool) -> Result<Self> {
        Ok(Self {
            cluster_name: required_name("cluster name", cluster_name)?,
            cluster_ip: parse_ip("cluster ip", cluster_ip)?,
            install_tools,
        })
    }

    /// Features to install before the cluster is created or joined, in order
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = BASE_FEATURES.to_vec();
        if self.install_tools {
            features.push(TOOLS_FEATURE);
        }
        features
    }
}

/// Desired quorum witness.
///
/// At most one of the two options may be set; the quorum reconciler
/// rejects a config with both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DesiredQuorumConfig {
    /// Cluster disk to use as disk witness
    pub quorum_disk: Option<String>,
    /// UNC path of the file share witness
    pub fs_witness_path: Option<String>,
}

impl DesiredQuorumConfig {
    /// Create a quorum config; blank values count as unset
    pub fn new(quorum_disk: Option<&str>, fs_witness_path: Option<&str>) -> Self {
        Self {
            quorum_disk: optional_value(quorum_disk),
            fs_witness_path: optional_value(fs_witness_path),
        }
    }

    pub fn disk(disk: &str) -> Self {
        Self::new(Some(disk), None)
    }

    pub fn file_share(path: &str) -> Self {
        Self::new(None, Some(path))
    }

    /// True when neither option is set
    pub fn is_empty(&self) -> bool {
        self.quorum_disk.is_none() && self.fs_witness_path.is_none()
    }
}

/// Ordered, non-empty list of services making up a role.
///
/// The first entry is the primary service bound when the role is created;
/// the rest are attached afterwards in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ServiceList(Vec<String>);

impl ServiceList {
    /// Build a list, rejecting blank entries and an empty list.
    ///
    /// A blank entry is an error rather than skipped: dropping it would
    /// silently promote the next service to primary.
    pub fn new<I, S>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        for (position, service) in services.into_iter().enumerate() {
            match optional_value(Some(service.as_ref())) {
                Some(name) => list.push(name),
                None => {
                    return Err(ClusterError::Validation(format!(
                        "service name at position {} must not be blank",
                        position + 1
                    )));
                }
            }
        }

        if list.is_empty() {
            return Err(ClusterError::Validation(
                "a service role needs at least one service".to_string(),
            ));
        }

        Ok(Self(list))
    }

    /// Service bound at role creation
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    /// Services attached after the role exists, in order
    pub fn secondaries(&self) -> &[String] {
        &self.0[1..]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Desired generic service role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredServiceRole {
    /// Cluster group name
    pub role_name: String,
    /// Services in the role
    pub services: ServiceList,
    /// Static address of the role's client access point
    pub service_ip: IpAddr,
    /// Cluster disk assigned to the role
    pub storage: Option<String>,
    /// Registry keys replicated between nodes
    pub checkpoint_keys: Vec<String>,
}

impl DesiredServiceRole {
    /// Create a role config, validating name, services and address
    pub fn new(role_name: &str, services: ServiceList, service_ip: &str) -> Result<Self> {
        Ok(Self {
            role_name: required_name("role name", role_name)?,
            services,
            service_ip: parse_ip("service ip", service_ip)?,
            storage: None,
            checkpoint_keys: Vec::new(),
        })
    }

    /// Set the cluster disk
    pub fn storage(mut self, storage: &str) -> Self {
        self.storage = optional_value(Some(storage));
        self
    }

    /// Set the checkpoint registry keys
    pub fn checkpoint_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.checkpoint_keys = keys
            .into_iter()
            .filter_map(|k| optional_value(Some(k.as_ref())))
            .collect();
        self
    }
}
