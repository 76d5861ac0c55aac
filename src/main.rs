//! wfcluster - Windows failover cluster reconciler
//!
//! This is the main CLI entry point for wfcluster.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wfcluster::cluster::{ConvergeRequest, Plan, ReconcileReport, ReconciliationEngine};
use wfcluster::config::{Credentials, Manifest, ResolvedManifest};
use wfcluster::exec::{ExecutorFeatureInstaller, PowerShellExecutor};

/// wfcluster - converge a Windows failover cluster to a manifest
#[derive(Parser)]
#[command(name = "wfcluster")]
#[command(version)]
#[command(about = "Desired-state reconciler for Windows failover clusters", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Cluster manifest (defaults to <config dir>/wfcluster/cluster.yaml)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the manifest without touching the cluster
    Validate,
    /// Show the steps a pass would run
    Plan {
        #[command(flatten)]
        selection: Selection,
    },
    /// Converge the cluster
    Apply {
        #[command(flatten)]
        selection: Selection,
        /// Repeat passes every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}

#[derive(Args, Clone)]
struct Selection {
    /// What to converge
    #[arg(long, value_enum, default_value_t = TargetKind::All)]
    target: TargetKind,
    /// Only this role
    #[arg(long)]
    role: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    /// Node (with quorum when declared), then every role
    All,
    Node,
    Quorum,
    Roles,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Requests for the selected passes, each with the credentials it runs as
fn passes(manifest: &ResolvedManifest, selection: &Selection) -> anyhow::Result<Vec<(ConvergeRequest, Credentials)>> {
    let mut passes = Vec::new();
    let node = manifest.node.clone();

    if matches!(selection.target, TargetKind::All | TargetKind::Node | TargetKind::Quorum) {
        let request = match (&manifest.quorum, selection.target) {
            (Some(quorum), TargetKind::All | TargetKind::Quorum) => ConvergeRequest::quorum(node.clone(), quorum.clone()),
            (None, TargetKind::Quorum) => bail!("manifest declares no quorum witness"),
            _ => ConvergeRequest::node(node.clone()),
        };
        passes.push((request, manifest.credentials.clone()));
    }

    if matches!(selection.target, TargetKind::All | TargetKind::Roles) {
        let roles: Vec<_> = match &selection.role {
            Some(name) => match manifest.role(name) {
                Some(role) => vec![role],
                None => bail!("role {} is not declared in the manifest", name),
            },
            None => manifest.roles.iter().collect(),
        };
        for role in roles {
            passes.push((ConvergeRequest::role(node.clone(), role.role.clone()), role.credentials.clone()));
        }
    }

    Ok(passes)
}

fn engine(manifest: &ResolvedManifest, credentials: &Credentials) -> ReconciliationEngine {
    let executor = Arc::new(PowerShellExecutor::new(&manifest.target));
    let installer = Arc::new(ExecutorFeatureInstaller::new(executor.clone(), manifest.credentials.clone()));
    ReconciliationEngine::new(executor, installer, credentials.clone(), &manifest.local_node)
}

fn print_report(report: &ReconcileReport, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let status = if report.changed() { "changed" } else { "unchanged" };
            println!("{}: {} ({} step(s), run {})", report.target, status, report.steps.len(), report.run_id);
            for step in &report.steps {
                println!("  {} [{}]", step.action, step.mode);
            }
            for step in report.ignored() {
                println!("  warning: {} failed and was ignored", step.action);
            }
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(plan)?),
        OutputFormat::Text => {
            println!("{}: {} step(s)", plan.target, plan.actions.len());
            println!("  ensure features: {}", plan.features.join(", "));
            for action in &plan.actions {
                println!("  {}", action.script());
            }
        }
    }
    Ok(())
}

/// One pass per selected resource, stopping at the first failure
fn apply_once(manifest: &ResolvedManifest, selection: &Selection, output: OutputFormat) -> anyhow::Result<()> {
    for (request, credentials) in passes(manifest, selection)? {
        let report = engine(manifest, &credentials)
            .converge(&request)
            .with_context(|| format!("converging {}", request.target))?;
        print_report(&report, output)?;
    }
    Ok(())
}

fn load(path: Option<PathBuf>) -> anyhow::Result<ResolvedManifest> {
    let path = path.unwrap_or_else(Manifest::default_path);
    let manifest = Manifest::parse_file(&path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    manifest
        .resolve()
        .with_context(|| format!("validating manifest {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let manifest = load(cli.file)?;
    let output = cli.output;

    match cli.command {
        Commands::Validate => {
            let all = Selection { target: TargetKind::All, role: None };
            for (request, _) in passes(&manifest, &all)? {
                request.validate().with_context(|| format!("validating {}", request.target))?;
            }
            println!(
                "Manifest OK: cluster {} ({}), node {}, {} role(s)",
                manifest.node.cluster_name,
                manifest.node.cluster_ip,
                manifest.local_node,
                manifest.roles.len()
            );
        }

        Commands::Plan { selection } => {
            let plans = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Plan>> {
                let mut plans = Vec::new();
                for (request, credentials) in passes(&manifest, &selection)? {
                    plans.push(engine(&manifest, &credentials).plan(&request)?);
                }
                Ok(plans)
            })
            .await??;

            for plan in &plans {
                print_plan(plan, output)?;
            }
        }

        Commands::Apply { selection, interval: None } => {
            tokio::task::spawn_blocking(move || apply_once(&manifest, &selection, output)).await??;
        }

        Commands::Apply {
            selection,
            interval: Some(secs),
        } => {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            tracing::info!("Reconciling every {}s, press Ctrl-C to stop", secs.max(1));
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Interrupted, stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let manifest = manifest.clone();
                        let selection = selection.clone();
                        match tokio::task::spawn_blocking(move || apply_once(&manifest, &selection, output)).await {
                            Ok(Ok(())) => {}
                            // Retried on the next tick
                            Ok(Err(e)) => tracing::error!("Pass failed: {:#}", e),
                            Err(e) => tracing::error!("Pass aborted: {}", e),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
