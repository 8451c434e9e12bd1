//! armada: fleet provisioning CLI.
//!
//! Runs complete lifecycles against the in-memory simulated control plane:
//! register a build, create a fleet and wait for activation, reconcile
//! access rules, tear everything down again. Nothing persists across runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use armada_core::diff_records;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use armada_provisioner::control_plane::ControlPlane;
use armada_provisioner::provisioner::build::BuildProvisioner;
use armada_provisioner::provisioner::fleet::FleetProvisioner;
use armada_provisioner::sim::SimControlPlane;
use armada_provisioner::types::{load_spec, BuildRef, Deployment, FleetSpec};

/// armada fleet provisioner
#[derive(Parser, Debug)]
#[command(name = "armada", version, about)]
struct Args {
    /// Poll interval in milliseconds for state waits
    #[arg(long, default_value = "50")]
    poll_interval_ms: u64,

    /// Timeout in seconds for state waits
    #[arg(long, default_value = "60")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full lifecycle from a deployment file against the simulator
    Run {
        /// Deployment JSON (build + fleet spec)
        #[arg(long)]
        spec: PathBuf,

        /// Updated fleet spec whose access rules are reconciled after
        /// activation
        #[arg(long)]
        update: Option<PathBuf>,

        /// Skip the teardown at the end and print the fleet instead
        #[arg(long)]
        keep: bool,
    },
    /// Print the add/remove plan between two fleet specs
    Diff {
        #[arg(long)]
        old: PathBuf,

        #[arg(long)]
        new: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "armada=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let timeout = Duration::from_secs(args.timeout_secs);
    let poll_interval = Duration::from_millis(args.poll_interval_ms);

    match args.command {
        Command::Run { spec, update, keep } => run(spec, update, keep, timeout, poll_interval).await,
        Command::Diff { old, new } => diff(old, new),
    }
}

async fn run(
    spec: PathBuf,
    update: Option<PathBuf>,
    keep: bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deployment: Deployment = load_spec(&spec)?;
    let control_plane: Arc<dyn ControlPlane> = Arc::new(SimControlPlane::new());
    let builds = BuildProvisioner::new(Arc::clone(&control_plane), timeout, poll_interval);
    let fleets = FleetProvisioner::new(Arc::clone(&control_plane), timeout, poll_interval);

    let build = builds.create(&deployment.build).await?;
    info!(build_id = %build.id, status = %build.status, "Build ready");

    let build_ref: BuildRef = deployment.fleet.build_ref.parse()?;
    let resolved = builds.resolve(&build_ref).await?;
    let fleet = fleets.create(&deployment.fleet, &resolved.id).await?;
    info!(fleet_id = %fleet.id, status = %fleet.status, "Fleet active");

    if let Some(update_path) = update {
        let updated: FleetSpec = load_spec(&update_path)?;
        fleets
            .update_access_rules(&fleet.id, &updated.access_rules)
            .await?;
        info!(fleet_id = %fleet.id, "Access rules reconciled");
    }

    if keep {
        println!("{}", serde_json::to_string_pretty(&fleet)?);
        return Ok(());
    }

    fleets.delete(&fleet.id).await?;
    builds.delete(&resolved.id).await?;
    info!("Lifecycle complete");
    Ok(())
}

fn diff(old: PathBuf, new: PathBuf) -> Result<()> {
    let old_spec: FleetSpec = load_spec(&old)?;
    let new_spec: FleetSpec = load_spec(&new)?;
    let plan = diff_records(&old_spec.access_rules, &new_spec.access_rules);
    let out = json!({ "toAdd": plan.to_add, "toRemove": plan.to_remove });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
