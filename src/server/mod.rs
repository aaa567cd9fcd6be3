//! HTTP surface for the A2A protocol engine.
//!
//! Mounts the JSON-RPC endpoint, the discovery document, and the
//! health and debug routes behind an axum router, with admission
//! control and response hygiene applied as middleware.

pub mod handlers;
pub mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::admission::RateLimiter;
use crate::agents::AgentRegistry;
use crate::auth::JwtValidator;
use crate::config::GlobalConfig;
use crate::persistence::task_repo::TaskRepo;
use crate::registry::TaskRegistry;
use crate::{AppError, Result};

/// Shared state handed to every handler and stateful middleware.
#[derive(Clone)]
pub struct AppState {
    /// Immutable runtime configuration.
    pub config: Arc<GlobalConfig>,
    /// Registered agent instances, fixed after startup.
    pub agents: Arc<AgentRegistry>,
    /// Authoritative in-process record of live tasks.
    pub tasks: Arc<TaskRegistry>,
    /// Per-client sliding admission windows.
    pub limiter: Arc<RateLimiter>,
    /// Bearer credential validator for the RPC boundary.
    pub validator: Arc<JwtValidator>,
    /// Durable task store; absent when no database is configured.
    pub store: Option<TaskRepo>,
}

impl AppState {
    /// Assemble shared state from configuration and registered agents.
    #[must_use]
    pub fn new(config: GlobalConfig, agents: AgentRegistry, store: Option<TaskRepo>) -> Self {
        let limiter = RateLimiter::new(
            config.limits.rate_limit_rpm,
            config.limits.rate_limit_burst,
        );
        let validator = JwtValidator::new(&config.auth.secret);
        Self {
            config: Arc::new(config),
            agents: Arc::new(agents),
            tasks: Arc::new(TaskRegistry::new()),
            limiter: Arc::new(limiter),
            validator: Arc::new(validator),
            store,
        }
    }
}

/// Build the application router with all middleware layers applied.
///
/// Debug routes are mounted only when `debug` is set; in release
/// configurations those paths fall through to 404.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/rpc", post(handlers::rpc))
        .route("/.well-known/agent.json", get(handlers::agent_card))
        .route("/health", get(handlers::health));

    if state.config.debug {
        router = router
            .route("/debug/tasks", get(handlers::debug_tasks))
            .route("/debug/agents", get(handlers::debug_agents))
            .route("/debug/config", get(handlers::debug_config));
    }

    let cors = cors_layer(&state.config);
    // Replaces axum's built-in 2 MiB extraction limit so the ceiling
    // enforced on the body is the configured one; the middleware's
    // Content-Length check only covers requests that declare a length.
    let body_limit = DefaultBodyLimit::max(
        usize::try_from(state.config.limits.max_request_size).unwrap_or(usize::MAX),
    );

    // Layers apply inside-out: the last layer added runs first, so CORS
    // wraps the security gate which wraps request logging.
    router
        .layer(body_limit)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_log,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::security_gate,
        ))
        .layer(cors)
        .with_state(state)
}

/// CORS policy from the configured origin list.
///
/// A literal `"*"` entry opens the endpoint to any origin; otherwise
/// only origins that parse as valid header values are allowed and
/// credentialed requests are permitted.
fn cors_layer(config: &GlobalConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins).allow_credentials(true)
    }
}

/// Start the HTTP transport and serve until the token is cancelled.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener fails to bind or the
/// server loop exits with an I/O failure.
pub async fn serve(state: AppState, ct: CancellationToken) -> Result<()> {
    let bind = state.config.bind_addr();
    let app_name = state.config.app_name.clone();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {bind}: {err}")))?;

    info!(%bind, %app_name, "starting A2A HTTP transport");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { ct.cancelled().await })
    .await
    .map_err(|err| AppError::Config(format!("HTTP server error: {err}")))?;

    info!("A2A HTTP transport shut down");
    Ok(())
}
