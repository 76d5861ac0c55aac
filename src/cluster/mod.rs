//! Failover cluster reconciliation
//!
//! This module turns desired node, quorum and role configuration plus a
//! snapshot of the live cluster into the ordered PowerShell steps that
//! close the gap.

pub mod action;
pub mod engine;
pub mod node;
pub mod quorum;
pub mod role;
pub mod snapshot;

pub use action::Action;
pub use engine::{ConvergeRequest, EngineState, Plan, ReconcileReport, ReconciliationEngine, Stage, Target};
pub use node::{NodeAction, NodeReconciler};
pub use quorum::{QuorumAction, QuorumReconciler};
pub use role::ServiceRoleReconciler;
pub use snapshot::{ClusterSnapshot, ClusterStateProbe, SnapshotScope};
