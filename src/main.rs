#![forbid(unsafe_code)]

//! `agent-exchange` — A2A protocol server binary.
//!
//! Bootstraps configuration, registers the default agent set, starts
//! the background sweeps, and serves the JSON-RPC/SSE HTTP transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agent_exchange::agents::simple::SimpleAgent;
use agent_exchange::agents::AgentRegistry;
use agent_exchange::persistence::db;
use agent_exchange::persistence::task_repo::TaskRepo;
use agent_exchange::server::{self, AppState};
use agent_exchange::{admission, registry};
use agent_exchange::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-exchange", about = "A2A protocol server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-exchange server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(port) = args.port {
        config.http_port = port;
    }
    config.load_credentials().await?;
    info!(bind = %config.bind_addr(), "configuration loaded");

    // ── Initialize task store ───────────────────────────
    let store = match &config.db_path {
        Some(path) => {
            let pool = db::connect(path).await?;
            info!(db = %path.display(), "task store connected");
            Some(TaskRepo::new(pool))
        }
        None => {
            info!("no database configured; the registry is the only task record");
            None
        }
    };

    // ── Register agents ─────────────────────────────────
    let mut agents = AgentRegistry::new();
    agents.register(
        &config.default_agent,
        Arc::new(SimpleAgent::new(
            "Hello World Agent",
            "Simple agent for exercising the A2A protocol",
            "Hello from agent-exchange! This is a simple response.",
        )),
    );
    info!(agents = agents.len(), default = %config.default_agent, "agents registered");

    // ── Build shared application state ──────────────────
    let state = AppState::new(config, agents, store);

    // ── Start background sweeps ─────────────────────────
    let ct = CancellationToken::new();
    let limiter_sweep = admission::spawn_sweep_task(
        Arc::clone(&state.limiter),
        Duration::from_secs(state.config.retention.client_idle_seconds),
        ct.clone(),
    );
    let registry_sweep = registry::spawn_sweep_task(
        Arc::clone(&state.tasks),
        Duration::from_secs(state.config.retention.task_grace_seconds),
        ct.clone(),
    );

    // ── Start HTTP transport ────────────────────────────
    let server_ct = ct.clone();
    let server_state = state.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(server_state, server_ct).await {
            error!(%err, "HTTP transport failed");
        }
    });

    info!("A2A server ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    // ── Wait for background tasks ───────────────────────
    let _ = tokio::join!(server_handle, limiter_sweep, registry_sweep);
    info!("agent-exchange shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
