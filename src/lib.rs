//! wfcluster - desired-state reconciler for Windows failover clusters
//!
//! wfcluster converges a Windows Server failover cluster towards a declared
//! configuration, issuing only the PowerShell cluster cmdlets needed:
//!
//! - Cluster creation or join for the local node
//! - Quorum witness selection (disk witness or file share witness)
//! - Generic service roles with dependent secondary services
//!
//! Commands run through a [`exec::CommandExecutor`], so the reconcilers can
//! be exercised without a cluster.

pub mod cluster;
pub mod config;
pub mod error;
pub mod exec;

pub use error::{ClusterError, Result};
