//! slipwayd — the Slipway daemon.
//!
//! Single binary that assembles the deployment engine:
//! - Record store (redb)
//! - Preflight signal source
//! - Strategy executor + rollback compensator
//! - REST API
//!
//! # Usage
//!
//! ```text
//! slipwayd serve --port 8080 --data-dir /var/lib/slipway
//! slipwayd deploy --strategy canary --environment staging --release 3.0.0 --dry-run
//! slipwayd check-config --config slipway.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use slipway_api::{ApiState, build_router};
use slipway_core::DeploymentSubmission;
use slipway_core::config::EngineConfig;
use slipway_core::ports::{LogAlertSink, SystemClock, TracingTelemetry};
use slipway_engine::Orchestrator;
use slipway_infra::{HttpSignalSource, SimDriver, SimSignals, WebhookDriver};
use slipway_preflight::SignalSource;
use slipway_rollout::EffectDriver;
use slipway_store::RecordStore;

/// Ceiling for a single infrastructure webhook round trip. Monitoring
/// windows wait locally, so this only bounds the HTTP call itself.
const EFFECT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "slipwayd", about = "Slipway deployment engine daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Submit one deployment, wait for its terminal state and print the
    /// outcome as JSON.
    Deploy {
        #[command(flatten)]
        submission: SubmissionArgs,

        #[command(flatten)]
        backend: BackendArgs,
    },

    /// Load a configuration file and report every validation error.
    CheckConfig {
        /// Engine configuration file (TOML).
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct BackendArgs {
    /// Engine configuration file (TOML). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for the deployment record store.
    #[arg(long, default_value = "/var/lib/slipway")]
    data_dir: PathBuf,

    /// host:port of the readiness-signal service.
    #[arg(long, default_value = "127.0.0.1:9400")]
    signals_addr: String,

    /// host:port of the infrastructure webhook service.
    #[arg(long, default_value = "127.0.0.1:9500")]
    effects_addr: String,

    /// Use the deterministic in-process drivers and an in-memory store.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct SubmissionArgs {
    /// Rollout strategy: blue_green, canary, rolling or hotfix.
    #[arg(long)]
    strategy: String,

    /// Target environment: development, staging or production.
    #[arg(long)]
    environment: String,

    /// Release version, MAJOR.MINOR.PATCH with an optional -prerelease tag.
    #[arg(long)]
    release: String,

    /// Rollback policy: immediate or manual. Config default when omitted.
    #[arg(long)]
    rollback: Option<String>,

    /// Skip the post-deployment health verification.
    #[arg(long)]
    no_health_checks: bool,

    /// Actor recorded as the deployment initiator.
    #[arg(long, default_value = "slipwayd")]
    actor: String,
}

impl SubmissionArgs {
    fn into_submission(self) -> DeploymentSubmission {
        DeploymentSubmission {
            deployment_type: self.strategy,
            environment: self.environment,
            version: self.release,
            rollback_strategy: self.rollback,
            health_checks: self.no_health_checks.then_some(false),
            approval_required: None,
            initiated_by: self.actor,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slipwayd=debug,slipway_engine=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, backend } => run_serve(port, backend).await,
        Command::Deploy {
            submission,
            backend,
        } => run_deploy(submission, backend).await,
        Command::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Err(errors) = config.validate() {
        for error in &errors {
            error!(%error, "configuration rejected");
        }
        anyhow::bail!("configuration invalid ({} error(s))", errors.len());
    }
    Ok(config)
}

/// Assemble the orchestrator for the selected backend.
fn build_engine(config: EngineConfig, backend: &BackendArgs) -> anyhow::Result<Orchestrator> {
    let check_timeout = Duration::from_secs(config.preflight.check_timeout_secs);

    let (store, signals, driver): (RecordStore, Arc<dyn SignalSource>, Arc<dyn EffectDriver>) =
        if backend.dry_run {
            info!("dry run: in-memory store and deterministic drivers");
            (
                RecordStore::open_in_memory()?,
                Arc::new(SimSignals::default()),
                Arc::new(SimDriver::default()),
            )
        } else {
            std::fs::create_dir_all(&backend.data_dir)?;
            let db_path = backend.data_dir.join("slipway.redb");
            let store = RecordStore::open(&db_path)?;
            info!(path = ?db_path, "record store opened");
            (
                store,
                Arc::new(HttpSignalSource::new(&backend.signals_addr, check_timeout)),
                Arc::new(WebhookDriver::new(&backend.effects_addr, EFFECT_TIMEOUT)),
            )
        };

    Ok(Orchestrator::new(
        config,
        store,
        signals,
        driver,
        Arc::new(TracingTelemetry::new()),
        Arc::new(LogAlertSink),
        Arc::new(SystemClock),
    ))
}

async fn run_serve(port: u16, backend: BackendArgs) -> anyhow::Result<()> {
    info!("slipway daemon starting");

    let config = load_config(backend.config.as_deref())?;
    let orchestrator = build_engine(config, &backend)?;
    let router = build_router(ApiState::new(Arc::new(orchestrator)));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("slipway daemon stopped");
    Ok(())
}

async fn run_deploy(submission: SubmissionArgs, backend: BackendArgs) -> anyhow::Result<()> {
    let config = load_config(backend.config.as_deref())?;
    let orchestrator = build_engine(config, &backend)?;

    match orchestrator.run(submission.into_submission()).await {
        Ok(ticket) => {
            println!("{}", serde_json::to_string_pretty(&ticket)?);
            Ok(())
        }
        Err(err) => {
            error!(code = err.code(), "deployment failed");
            anyhow::bail!("{err}")
        }
    }
}

fn check_config(path: &Path) -> anyhow::Result<()> {
    let config =
        EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?;
    match config.validate() {
        Ok(()) => {
            println!("{}: ok", path.display());
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                eprintln!("  {error}");
            }
            anyhow::bail!("{}: {} validation error(s)", path.display(), errors.len())
        }
    }
}
