//! YAML cluster manifest
//!
//! The manifest is the host application's source of desired state. Loading
//! it resolves every default (run-as credentials, node name) once and
//! validates every value, so nothing downstream deals with raw strings.

use super::credentials::Credentials;
use super::desired::{DesiredNodeConfig, DesiredQuorumConfig, DesiredServiceRole, ServiceList};
use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = "cluster.yaml";

fn default_target() -> String {
    "localhost".to_string()
}

fn default_true() -> bool {
    true
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

/// Run-as account settings; any field may be left to the top-level default
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAsConfig {
    #[serde(default)]
    pub user: Option<String>,
    /// Inline password
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl RunAsConfig {
    /// Fill unset fields from `defaults`
    fn merged(&self, defaults: &RunAsConfig) -> RunAsConfig {
        RunAsConfig {
            user: self.user.clone().or_else(|| defaults.user.clone()),
            password: self.password.clone().or_else(|| {
                // An explicit env reference on the override beats an inherited inline password.
                if self.password_env.is_some() {
                    None
                } else {
                    defaults.password.clone()
                }
            }),
            password_env: self.password_env.clone().or_else(|| defaults.password_env.clone()),
            domain: self.domain.clone().or_else(|| defaults.domain.clone()),
        }
    }

    fn resolve<F>(&self, env: &F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| ClusterError::Validation("run_as.user is required".to_string()))?;

        let password = match (&self.password, &self.password_env) {
            (Some(password), _) => password.clone(),
            (None, Some(var)) => env(var).ok_or_else(|| {
                ClusterError::Validation(format!("environment variable {} is not set", var))
            })?,
            (None, None) => {
                return Err(ClusterError::Validation(
                    "run_as.password or run_as.password_env is required".to_string(),
                ))
            }
        };

        Credentials::new(user, &password, self.domain.as_deref())
    }
}

/// Quorum witness settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumSection {
    #[serde(default)]
    pub disk: Option<String>,
    #[serde(default)]
    pub file_share_witness: Option<String>,
}

/// Cluster settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSection {
    pub name: String,
    pub ip: String,
    #[serde(default = "default_true")]
    pub install_tools: bool,
    #[serde(default)]
    pub quorum: Option<QuorumSection>,
}

/// Generic service role settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSection {
    pub name: String,
    pub services: OneOrMany,
    pub ip: String,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub checkpoint_keys: OneOrMany,
    #[serde(default)]
    pub run_as: Option<RunAsConfig>,
}

/// Cluster manifest as written on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Default run-as account
    #[serde(default)]
    pub run_as: RunAsConfig,
    /// Host the cluster cmdlets run on
    #[serde(default = "default_target")]
    pub target: String,
    /// Local node name, defaults to the hostname
    #[serde(default)]
    pub node_name: Option<String>,
    pub cluster: ClusterSection,
    #[serde(default)]
    pub roles: Vec<RoleSection>,
}

/// A role with its resolved credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role: DesiredServiceRole,
    pub credentials: Credentials,
}

/// Validated manifest with all defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub target: String,
    pub local_node: String,
    pub credentials: Credentials,
    pub node: DesiredNodeConfig,
    pub quorum: Option<DesiredQuorumConfig>,
    pub roles: Vec<ResolvedRole>,
}

impl ResolvedManifest {
    pub fn role(&self, name: &str) -> Option<&ResolvedRole> {
        self.roles
            .iter()
            .find(|r| r.role.role_name.eq_ignore_ascii_case(name))
    }
}

impl Manifest {
    /// `<config dir>/wfcluster/cluster.yaml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wfcluster")
            .join(DEFAULT_MANIFEST)
    }

    pub fn parse_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Resolve against the process environment and hostname
    pub fn resolve(&self) -> Result<ResolvedManifest> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve using `env` to look up password variables
    pub fn resolve_with<F>(&self, env: F) -> Result<ResolvedManifest>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.target.trim().is_empty() {
            return Err(ClusterError::InvalidConfig("target host must not be empty".to_string()));
        }

        let credentials = self.run_as.resolve(&env)?;

        let node = DesiredNodeConfig::new(&self.cluster.name, &self.cluster.ip, self.cluster.install_tools)?;

        let quorum = self
            .cluster
            .quorum
            .as_ref()
            .map(|q| DesiredQuorumConfig::new(q.disk.as_deref(), q.file_share_witness.as_deref()))
            .filter(|q| !q.is_empty());

        let mut roles = Vec::with_capacity(self.roles.len());
        for section in &self.roles {
            let services = ServiceList::new(section.services.to_vec()).map_err(|e| match e {
                ClusterError::Validation(msg) => ClusterError::Validation(format!("role {}: {}", section.name, msg)),
                other => other,
            })?;
            let mut role = DesiredServiceRole::new(&section.name, services, &section.ip)?
                .checkpoint_keys(section.checkpoint_keys.to_vec());
            if let Some(storage) = &section.storage {
                role = role.storage(storage);
            }

            let credentials = match &section.run_as {
                Some(run_as) => run_as.merged(&self.run_as).resolve(&env)?,
                None => credentials.clone(),
            };
            roles.push(ResolvedRole { role, credentials });
        }

        let local_node = match self.node_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => gethostname::gethostname().to_string_lossy().to_string(),
        };

        Ok(ResolvedManifest {
            target: self.target.trim().to_string(),
            local_node,
            credentials,
            node,
            quorum,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"
run_as:
  user: svc_cluster
  password_env: WFC_PASSWORD
  domain: CORP
node_name: NODE1
cluster:
  name: CLUS1
  ip: 10.0.0.5
  quorum:
    file_share_witness: '\\fs01\witness'
roles:
  - name: APP
    services: [AppSvc, AppWorker]
    ip: 10.0.0.6
    storage: Cluster Disk 2
    checkpoint_keys: 'SOFTWARE\App'
  - name: SINGLE
    services: Single
    ip: 10.0.0.7
    run_as:
      user: svc_single
      password: inline
"#;

    fn env(var: &str) -> Option<String> {
        (var == "WFC_PASSWORD").then(|| "from-env".to_string())
    }

    #[test]
    fn test_parse_and_resolve() {
        let manifest = Manifest::parse_str(MANIFEST).unwrap();
        assert_eq!(manifest.target, "localhost");
        assert!(manifest.cluster.install_tools);

        let resolved = manifest.resolve_with(env).unwrap();
        assert_eq!(resolved.local_node, "NODE1");
        assert_eq!(resolved.credentials.principal(), "CORP\\svc_cluster");
        assert_eq!(resolved.credentials.password(), "from-env");
        assert_eq!(
            resolved.quorum.as_ref().and_then(|q| q.fs_witness_path.as_deref()),
            Some("\\\\fs01\\witness")
        );

        let app = resolved.role("app").unwrap();
        assert_eq!(app.role.services.primary(), "AppSvc");
        assert_eq!(app.role.checkpoint_keys, vec!["SOFTWARE\\App"]);
        assert_eq!(app.role.storage.as_deref(), Some("Cluster Disk 2"));

        let single = resolved.role("SINGLE").unwrap();
        assert_eq!(single.role.services.len(), 1);
        assert_eq!(single.credentials.principal(), "CORP\\svc_single");
        assert_eq!(single.credentials.password(), "inline");
    }

    #[test]
    fn test_missing_password_env() {
        let manifest = Manifest::parse_str(MANIFEST).unwrap();
        let result = manifest.resolve_with(|_| None);
        assert!(matches!(result, Err(ClusterError::Validation(_))));
    }

    #[test]
    fn test_invalid_ip_rejected() {
        let yaml = r#"
run_as: { user: svc, password: pw }
cluster: { name: CLUS1, ip: not-an-ip }
"#;
        let result = Manifest::parse_str(yaml).unwrap().resolve_with(|_| None);
        assert!(matches!(result, Err(ClusterError::Validation(_))));
    }

    #[test]
    fn test_empty_service_list_rejected() {
        let yaml = r#"
run_as: { user: svc, password: pw }
cluster: { name: CLUS1, ip: 10.0.0.5 }
roles:
  - { name: APP, services: [], ip: 10.0.0.6 }
"#;
        let result = Manifest::parse_str(yaml).unwrap().resolve_with(|_| None);
        assert!(matches!(result, Err(ClusterError::Validation(_))));
    }

    #[test]
    fn test_blank_service_entry_rejected() {
        let yaml = r#"
run_as: { user: svc, password: pw }
cluster: { name: CLUS1, ip: 10.0.0.5 }
roles:
  - { name: APP, services: ["", AppSvc], ip: 10.0.0.6 }
"#;
        match Manifest::parse_str(yaml).unwrap().resolve_with(|_| None) {
            Err(ClusterError::Validation(msg)) => {
                assert!(msg.starts_with("role APP:"), "{}", msg);
                assert!(msg.contains("blank"), "{}", msg);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_blank_quorum_dropped() {
        let yaml = r#"
run_as: { user: svc, password: pw }
node_name: NODE1
cluster:
  name: CLUS1
  ip: 10.0.0.5
  install_tools: false
  quorum: { disk: "" }
"#;
        let resolved = Manifest::parse_str(yaml).unwrap().resolve_with(|_| None).unwrap();
        assert!(resolved.quorum.is_none());
        assert!(!resolved.node.install_tools);
    }

    #[test]
    fn test_parse_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_MANIFEST);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let manifest = Manifest::parse_file(&path).unwrap();
        assert_eq!(manifest.cluster.name, "CLUS1");
        assert_eq!(manifest.roles.len(), 2);

        assert!(matches!(
            Manifest::parse_file(&dir.path().join("missing.yaml")),
            Err(ClusterError::Io(_))
        ));
    }

    #[test]
    fn test_blank_target_rejected() {
        let yaml = r#"
run_as: { user: svc, password: pw }
target: " "
cluster: { name: CLUS1, ip: 10.0.0.5 }
"#;
        let result = Manifest::parse_str(yaml).unwrap().resolve_with(|_| None);
        assert!(matches!(result, Err(ClusterError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            Manifest::parse_str("cluster: [unclosed"),
            Err(ClusterError::Yaml(_))
        ));
    }
}
