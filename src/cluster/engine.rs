//! Reconciliation engine
//!
//! One call to [`ReconciliationEngine::converge`] is one pass:
//!
//! ```text
//! Idle -> Probing -> Reconciling(Node) -> Reconciling(Quorum|Service) -> Done
//!                                      \-> Failed (first fatal error)
//! ```
//!
//! Required features are installed before anything is read, since the
//! cluster cmdlets only exist once they are. The snapshot is then captured
//! once. After a successful create or join the engine records the known
//! effect in that snapshot instead of probing again.

use super::action::Action;
use super::node::{NodeAction, NodeReconciler};
use super::quorum::QuorumReconciler;
use super::role::ServiceRoleReconciler;
use super::snapshot::{ClusterSnapshot, ClusterStateProbe, SnapshotScope};
use crate::config::{Credentials, DesiredNodeConfig, DesiredQuorumConfig, DesiredServiceRole};
use crate::error::{ClusterError, Result};
use crate::exec::{BoxedExecutor, ExecMode, FeatureInstaller};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Resource being converged after node membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Node membership only
    Node,
    /// Quorum witness
    Quorum(DesiredQuorumConfig),
    /// Generic service role
    ServiceRole(DesiredServiceRole),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Node => write!(f, "node"),
            Target::Quorum(_) => write!(f, "quorum"),
            Target::ServiceRole(role) => write!(f, "role {}", role.role_name),
        }
    }
}

/// Input of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergeRequest {
    pub node: DesiredNodeConfig,
    pub target: Target,
}

impl ConvergeRequest {
    pub fn node(node: DesiredNodeConfig) -> Self {
        Self { node, target: Target::Node }
    }

    pub fn quorum(node: DesiredNodeConfig, quorum: DesiredQuorumConfig) -> Self {
        Self {
            node,
            target: Target::Quorum(quorum),
        }
    }

    pub fn role(node: DesiredNodeConfig, role: DesiredServiceRole) -> Self {
        Self {
            node,
            target: Target::ServiceRole(role),
        }
    }

    /// Checks that need no cluster access; run before anything executes
    pub fn validate(&self) -> Result<()> {
        if let Target::Quorum(quorum) = &self.target {
            QuorumReconciler::check(quorum)?;
        }
        Ok(())
    }

    fn scope(&self) -> SnapshotScope {
        let scope = SnapshotScope::new(&self.node.cluster_name);
        match &self.target {
            Target::Node => scope,
            Target::Quorum(_) => scope.quorum(),
            Target::ServiceRole(role) => scope.role(&role.role_name, role.services.primary()),
        }
    }
}

/// Sub-reconciler currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Node,
    Quorum,
    Service,
}

/// Engine state within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Probing,
    Reconciling(Stage),
    Done,
    Failed,
}

/// How an executed step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    /// Best-effort step failed; the pass continued
    Ignored { error: String },
}

/// A step the engine ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutedStep {
    pub action: Action,
    pub mode: ExecMode,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Result of a completed pass
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Pass identifier, also attached to the pass's log span
    pub run_id: Uuid,
    /// What was converged
    pub target: String,
    /// States visited, in order
    pub transitions: Vec<EngineState>,
    /// Steps executed, in order
    pub steps: Vec<ExecutedStep>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ReconcileReport {
    fn new(target: &Target) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target: target.to_string(),
            transitions: vec![EngineState::Idle],
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn transition(&mut self, next: EngineState) {
        tracing::debug!(from = ?self.state(), to = ?next, "engine transition");
        self.transitions.push(next);
    }

    /// Final state of the pass
    pub fn state(&self) -> EngineState {
        self.transitions.last().copied().unwrap_or(EngineState::Idle)
    }

    /// True when any step was applied
    pub fn changed(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.outcome == StepOutcome::Applied && s.mode == ExecMode::FailFast)
    }

    /// Best-effort steps that failed
    pub fn ignored(&self) -> impl Iterator<Item = &ExecutedStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Ignored { .. }))
    }
}

/// Steps a pass would run, without running them
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub target: String,
    /// Features ensured before any mutation
    pub features: Vec<String>,
    pub node_action: NodeAction,
    pub actions: Vec<Action>,
}

/// Drives the node, quorum and role reconcilers for one pass at a time
pub struct ReconciliationEngine {
    executor: BoxedExecutor,
    installer: Arc<dyn FeatureInstaller>,
    probe: ClusterStateProbe,
    credentials: Credentials,
    local_node: String,
}

impl ReconciliationEngine {
    pub fn new(
        executor: BoxedExecutor,
        installer: Arc<dyn FeatureInstaller>,
        credentials: Credentials,
        local_node: &str,
    ) -> Self {
        Self {
            probe: ClusterStateProbe::new(executor.clone(), credentials.clone()),
            executor,
            installer,
            credentials,
            local_node: local_node.to_string(),
        }
    }

    /// Run one reconciliation pass, stopping at the first fatal error
    pub fn converge(&self, request: &ConvergeRequest) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new(&request.target);
        let span = tracing::info_span!("reconcile", run_id = %report.run_id, target = %report.target);
        let _enter = span.enter();

        match self.run_pass(request, &mut report) {
            Ok(()) => {
                report.transition(EngineState::Done);
                report.finished_at = Some(Utc::now());
                tracing::info!(
                    steps = report.steps.len(),
                    changed = report.changed(),
                    "Reconciliation of {} complete",
                    report.target
                );
                Ok(report)
            }
            Err(e) => {
                report.transition(EngineState::Failed);
                tracing::error!(
                    steps = report.steps.len(),
                    "Reconciliation of {} failed: {}",
                    report.target,
                    e
                );
                Err(e)
            }
        }
    }

    /// Probe and compute the steps of a pass without executing any
    pub fn plan(&self, request: &ConvergeRequest) -> Result<Plan> {
        request.validate()?;

        let mut snapshot = self.probe.capture(&request.scope())?;
        let node_action = NodeReconciler::reconcile(&request.node, &snapshot, &self.local_node);
        let mut actions = NodeReconciler::actions(&request.node, &node_action, &self.local_node);
        self.record_node_effect(&mut snapshot, &request.node, &node_action);
        actions.extend(self.target_actions(&request.target, &snapshot)?);

        Ok(Plan {
            target: request.target.to_string(),
            features: request.node.features().iter().map(|f| f.to_string()).collect(),
            node_action,
            actions,
        })
    }

    fn run_pass(&self, request: &ConvergeRequest, report: &mut ReconcileReport) -> Result<()> {
        request.validate()?;

        self.installer.install(&request.node.features())?;

        report.transition(EngineState::Probing);
        let mut snapshot = self.probe.capture(&request.scope())?;

        report.transition(EngineState::Reconciling(Stage::Node));

        let node_action = NodeReconciler::reconcile(&request.node, &snapshot, &self.local_node);
        tracing::debug!(action = ?node_action, node = %self.local_node, "node reconciled");
        for action in NodeReconciler::actions(&request.node, &node_action, &self.local_node) {
            self.execute(&action, report)?;
        }
        self.record_node_effect(&mut snapshot, &request.node, &node_action);

        match &request.target {
            Target::Node => {}
            Target::Quorum(_) => report.transition(EngineState::Reconciling(Stage::Quorum)),
            Target::ServiceRole(_) => report.transition(EngineState::Reconciling(Stage::Service)),
        }
        for action in self.target_actions(&request.target, &snapshot)? {
            self.execute(&action, report)?;
        }

        Ok(())
    }

    fn record_node_effect(&self, snapshot: &mut ClusterSnapshot, node: &DesiredNodeConfig, action: &NodeAction) {
        match action {
            NodeAction::Create => snapshot.record_cluster_created(&node.cluster_name, &self.local_node),
            NodeAction::Join => snapshot.record_joined(&self.local_node),
            NodeAction::NoOp => {}
        }
    }

    fn target_actions(&self, target: &Target, snapshot: &ClusterSnapshot) -> Result<Vec<Action>> {
        Ok(match target {
            Target::Node => Vec::new(),
            Target::Quorum(quorum) => QuorumReconciler::reconcile(quorum, snapshot)?.into_actions(),
            Target::ServiceRole(role) => ServiceRoleReconciler::reconcile(role, snapshot, &self.local_node),
        })
    }

    fn execute(&self, action: &Action, report: &mut ReconcileReport) -> Result<()> {
        let mode = action.mode();
        tracing::info!(mode = %mode, "Executing {}", action);

        let outcome = match self.executor.run(&action.script(), &self.credentials) {
            Ok(_) => StepOutcome::Applied,
            Err(source) if mode == ExecMode::FailFast => {
                return Err(ClusterError::CommandFailed {
                    step: action.name().to_string(),
                    resource: action.resource().to_string(),
                    source,
                });
            }
            Err(e) => {
                tracing::warn!("Best-effort step {} failed: {}", action, e);
                StepOutcome::Ignored { error: e.to_string() }
            }
        };

        report.steps.push(ExecutedStep {
            action: action.clone(),
            mode,
            outcome,
        });
        Ok(())
    }
}
