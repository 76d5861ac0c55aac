//! Windows feature installation

use super::{quote, BoxedExecutor};
use crate::config::Credentials;
use crate::error::{ClusterError, Result};

/// Installs OS feature packages before the cluster is touched
pub trait FeatureInstaller: Send + Sync {
    /// Install `features` in order, skipping any already present
    fn install(&self, features: &[&str]) -> Result<()>;
}

/// Installs features with `Install-WindowsFeature` through a command executor
pub struct ExecutorFeatureInstaller {
    executor: BoxedExecutor,
    credentials: Credentials,
}

impl ExecutorFeatureInstaller {
    pub fn new(executor: BoxedExecutor, credentials: Credentials) -> Self {
        Self { executor, credentials }
    }

    fn is_installed(&self, feature: &str) -> Result<bool> {
        let query = format!("(Get-WindowsFeature -Name {}).Installed", quote(feature));
        let output = self
            .executor
            .run_best_effort(&query, &self.credentials)
            .map_err(|source| ClusterError::FeatureInstall {
                feature: feature.to_string(),
                source,
            })?;
        Ok(output.value().eq_ignore_ascii_case("true"))
    }
}

impl FeatureInstaller for ExecutorFeatureInstaller {
    fn install(&self, features: &[&str]) -> Result<()> {
        for feature in features {
            if self.is_installed(feature)? {
                tracing::debug!("Windows feature {} already installed", feature);
                continue;
            }

            tracing::info!("Installing Windows feature {}", feature);
            let command = format!("Install-WindowsFeature -Name {}", quote(feature));
            self.executor
                .run(&command, &self.credentials)
                .map_err(|source| ClusterError::FeatureInstall {
                    feature: feature.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}
