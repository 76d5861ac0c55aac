//! Desired-state configuration
//!
//! Typed, validated inputs for the reconcilers and the YAML manifest they
//! are loaded from.

pub mod credentials;
pub mod desired;
pub mod manifest;

pub use credentials::Credentials;
pub use desired::{DesiredNodeConfig, DesiredQuorumConfig, DesiredServiceRole, ServiceList};
pub use manifest::{Manifest, ResolvedManifest, ResolvedRole};
