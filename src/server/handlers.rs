//! Route handlers for the RPC, discovery, health, and debug endpoints.
//!
//! Every RPC failure leaves as a JSON-RPC error envelope. Only
//! authentication rejections change the HTTP status; protocol-level
//! failures ride a 200 so envelope-aware clients see one shape.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::{bearer_token, CredentialValidator};
use crate::dispatch;
use crate::errors::{AppError, Result};
use crate::models::{AgentAuthentication, AgentCapabilities, AgentCard};
use crate::rpc::{decode_request, parse_value, JsonRpcRequest, JsonRpcResponse};
use crate::streaming::stream_task;

use super::AppState;

/// `POST /rpc` JSON-RPC endpoint.
pub async fn rpc(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    if let Err(err) = authenticate(&state, &headers) {
        let envelope = JsonRpcResponse::from_app_error(Value::Null, &err);
        return (StatusCode::UNAUTHORIZED, Json(envelope)).into_response();
    }

    let value = match parse_value(&body) {
        Ok(value) => value,
        Err(err) => {
            return Json(JsonRpcResponse::from_app_error(Value::Null, &err)).into_response();
        }
    };

    // Keep whatever id the caller sent even when the envelope itself
    // fails to decode, so the error can still be correlated.
    let salvaged_id = value.get("id").cloned().unwrap_or(Value::Null);

    let request = match decode_request(value) {
        Ok(request) => request,
        Err(err) => {
            return Json(JsonRpcResponse::from_app_error(salvaged_id, &err)).into_response();
        }
    };

    match request.method.as_str() {
        "message/send" => {
            let envelope = match dispatch::handle_send(&state, &request).await {
                Ok(result) => JsonRpcResponse::result(request.id_value(), result),
                Err(err) => JsonRpcResponse::from_app_error(request.id_value(), &err),
            };
            Json(envelope).into_response()
        }
        "message/stream" if !state.config.enable_streaming => {
            let err = AppError::MethodNotFound("message/stream".to_owned());
            Json(JsonRpcResponse::from_app_error(request.id_value(), &err)).into_response()
        }
        "message/stream" => message_stream(&state, &request).await,
        other => {
            let err = AppError::MethodNotFound(other.to_owned());
            Json(JsonRpcResponse::from_app_error(request.id_value(), &err)).into_response()
        }
    }
}

/// Enforce the optional bearer credential on the RPC boundary.
///
/// A presented token is always validated; a missing one is rejected
/// only when configuration requires authentication.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    match token {
        Some(token) => {
            let claims = state.validator.validate(token)?;
            debug!(sub = %claims.sub, "request authenticated");
            Ok(())
        }
        None if state.config.auth.required => {
            Err(AppError::Unauthorized("missing bearer token".to_owned()))
        }
        None => Ok(()),
    }
}

/// Admit a streaming request and hand the task to the SSE pipeline.
async fn message_stream(state: &AppState, request: &JsonRpcRequest) -> Response {
    let request_id = request.id_value();
    match dispatch::prepare_task(state, request).await {
        Ok((task, agent)) => {
            let stream = stream_task(
                Arc::clone(&state.tasks),
                agent,
                task,
                request_id,
                state.config.agent_timeout(),
            );
            Sse::new(stream)
                .keep_alive(
                    KeepAlive::new()
                        .interval(state.config.stream_keepalive())
                        .text("keepalive"),
                )
                .into_response()
        }
        Err(err) => Json(JsonRpcResponse::from_app_error(request_id, &err)).into_response(),
    }
}

/// `GET /.well-known/agent.json` discovery document.
///
/// Capabilities are the union of every registered agent's declared
/// set; the streaming flag can be masked off in configuration.
pub async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    let mut capabilities = AgentCapabilities {
        streaming: false,
        push_notifications: false,
        state_transition_history: false,
        multi_turn: false,
        file_upload: false,
        file_download: false,
    };
    let mut skills = Vec::new();
    for (_, agent) in state.agents.iter() {
        capabilities.merge_from(&agent.capabilities());
        skills.extend(agent.skills().iter().cloned());
    }
    capabilities.streaming &= state.config.enable_streaming;

    Json(AgentCard {
        name: state.config.app_name.clone(),
        description: "A2A protocol server dispatching tasks to pluggable agents".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        url: state.config.base_url(),
        capabilities,
        authentication: AgentAuthentication {
            schemes: vec!["bearer".to_owned()],
            required: state.config.auth.required,
        },
        skills,
        default_input_modes: default_modes(),
        default_output_modes: default_modes(),
        supports_authenticated_extended_card: false,
    })
}

fn default_modes() -> Vec<String> {
    vec!["text/plain".to_owned(), "application/json".to_owned()]
}

/// `GET /health` liveness document, read-only.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "active_tasks": state.tasks.len(),
        "registered_agents": state.agents.len(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /debug/tasks` snapshot of the live registry.
pub async fn debug_tasks(State(state): State<AppState>) -> Json<Value> {
    let tasks = state.tasks.snapshot();
    let total = tasks.len();
    Json(json!({
        "active_tasks": tasks,
        "total_count": total,
    }))
}

/// `GET /debug/config` snapshot of the effective configuration.
///
/// The auth secret never leaves the process; only a redaction marker
/// appears in its place.
pub async fn debug_config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "app_name": config.app_name,
        "host": config.host,
        "http_port": config.http_port,
        "debug": config.debug,
        "enable_streaming": config.enable_streaming,
        "default_agent": config.default_agent,
        "allowed_origins": config.allowed_origins,
        "db_path": config.db_path,
        "limits": {
            "rate_limit_rpm": config.limits.rate_limit_rpm,
            "rate_limit_burst": config.limits.rate_limit_burst,
            "max_request_size": config.limits.max_request_size,
        },
        "timeouts": {
            "agent_seconds": config.timeouts.agent_seconds,
            "stream_keepalive_seconds": config.timeouts.stream_keepalive_seconds,
            "slow_request_millis": config.timeouts.slow_request_millis,
        },
        "retention": {
            "task_grace_seconds": config.retention.task_grace_seconds,
            "client_idle_seconds": config.retention.client_idle_seconds,
        },
        "auth": {
            "required": config.auth.required,
            "secret": "[redacted]",
        },
    }))
}

/// `GET /debug/agents` descriptor snapshot of registered agents.
pub async fn debug_agents(State(state): State<AppState>) -> Json<Value> {
    let mut agents = serde_json::Map::new();
    for (agent_id, agent) in state.agents.iter() {
        agents.insert(
            agent_id.to_owned(),
            json!({
                "name": agent.name(),
                "description": agent.description(),
                "version": agent.version(),
                "skills": agent.skills(),
            }),
        );
    }
    let total = agents.len();
    Json(json!({
        "agents": agents,
        "total_count": total,
    }))
}
