//! lidar-tuner — CLI entry point for running sweeps, auto-tune rounds and
//! HIL-Tuner sessions against the in-process mock sensor backend.
//!
//! ## Environment variables
//!
//! | Variable       | Required | Description                               |
//! |----------------|----------|--------------------------------------------|
//! | `TUNER_CONFIG`  | No       | Path to a `tuner_config.toml` override     |

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use lidar_tuner_os::backend::mock::MockSensorBackend;
use lidar_tuner_os::backend::SensorBackend;
use lidar_tuner_os::config::{self, TunerConfig};
use lidar_tuner_os::persistence::memory::InMemoryPersister;
use lidar_tuner_os::persistence::Persister;
use lidar_tuner_os::runner::{StartInput, SweepRunner};
use lidar_tuner_os::types::request::SweepRequest;
use lidar_tuner_os::types::state::SweepStatus;

#[derive(Parser, Debug)]
#[command(name = "lidar-tuner", about = "LiDAR sensor parameter-optimisation control plane")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a Sweep Runner sweep from a JSON request file, against the mock backend.
    Sweep {
        /// Path to a JSON-encoded `SweepRequest`.
        #[arg(long)]
        request: std::path::PathBuf,

        /// Poll interval while waiting for completion.
        #[arg(long, default_value = "100ms")]
        poll_interval: String,
    },
    /// Print the built-in objective function registry.
    Objectives,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,lidar_tuner_os=debug")),
        )
        .init();

    config::init(TunerConfig::load());

    let args = CliArgs::parse();

    match args.command {
        Command::Sweep { request, poll_interval } => run_sweep(request, poll_interval).await,
        Command::Objectives => {
            let registry = lidar_tuner_os::objective::ObjectiveRegistry::new();
            for def in registry.list() {
                println!("{}\t{}\t{}", def.name, def.version, def.description);
            }
            Ok(())
        }
    }
}

async fn run_sweep(request_path: std::path::PathBuf, poll_interval: String) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&request_path)?;
    let request: SweepRequest = serde_json::from_str(&raw)?;

    let backend: Arc<dyn SensorBackend> = Arc::new(MockSensorBackend::new());
    let persister: Arc<dyn Persister> = Arc::new(InMemoryPersister::new());
    let runner = SweepRunner::new(backend).with_persister(persister);

    runner.start(StartInput::Typed(request)).await?;
    info!(sweep_id = %runner.get_sweep_id().await, "sweep started");

    let poll = lidar_tuner_os::duration::parse_or_default(&poll_interval, Duration::from_millis(100))?;

    loop {
        let snapshot = runner.snapshot().await;
        info!(
            completed = snapshot.completed_combos,
            total = snapshot.total_combos,
            status = ?snapshot.status,
            "sweep progress"
        );
        if matches!(snapshot.status, SweepStatus::Complete | SweepStatus::Error) {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            if matches!(snapshot.status, SweepStatus::Error) {
                anyhow::bail!(snapshot.error.unwrap_or_default());
            }
            return Ok(());
        }
        tokio::time::sleep(poll).await;
    }
}
