//! Run-as credentials for cluster commands

use crate::error::{ClusterError, Result};
use std::fmt;

/// Account the cluster cmdlets run under.
///
/// The password is never printed: `Debug` redacts it and there is no
/// `Display` or `Serialize` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
    domain: Option<String>,
}

impl Credentials {
    /// Create credentials, rejecting a blank user or password
    pub fn new(user: &str, password: &str, domain: Option<&str>) -> Result<Self> {
        let user = user.trim();
        if user.is_empty() {
            return Err(ClusterError::Validation(
                "run-as user must not be empty".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(ClusterError::Validation(format!(
                "run-as password for {} must not be empty",
                user
            )));
        }

        let domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self {
            user: user.to_string(),
            password: password.to_string(),
            domain,
        })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// `DOMAIN\user`, or the bare user when no domain is set
    pub fn principal(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}\\{}", domain, self.user),
            None => self.user.clone(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal() {
        let creds = Credentials::new("svc", "secret", Some("CORP")).unwrap();
        assert_eq!(creds.principal(), "CORP\\svc");

        let creds = Credentials::new("svc", "secret", Some("  ")).unwrap();
        assert_eq!(creds.principal(), "svc");
        assert!(creds.domain().is_none());
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(matches!(
            Credentials::new("", "secret", None),
            Err(ClusterError::Validation(_))
        ));
        assert!(matches!(
            Credentials::new("svc", "", None),
            Err(ClusterError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("svc", "hunter2", None).unwrap();
        let printed = format!("{:?}", creds);
        assert!(printed.contains("svc"));
        assert!(!printed.contains("hunter2"));
    }
}
