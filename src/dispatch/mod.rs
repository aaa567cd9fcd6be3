//! Task dispatch: request decoding through agent execution.
//!
//! [`prepare_task`] performs the shared front half of both RPC methods:
//! decode and validate params, screen content, resolve continuations,
//! select an agent, and register the task. [`handle_send`] adds the
//! synchronous back half, driving the agent to completion under one
//! deadline and settling the registry and store. The streaming back
//! half lives in [`crate::streaming`].

pub mod selector;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::Agent;
use crate::errors::{AppError, Result};
use crate::models::{MessageSendParams, Task, TaskState};
use crate::registry::TaskRegistry;
use crate::rpc::JsonRpcRequest;
use crate::safety;
use crate::server::AppState;

/// Derive the task id from the request id.
///
/// String and numeric ids are used as-is; a null id gets a generated
/// UUID so the task is still individually addressable.
#[must_use]
pub fn task_id_from_request(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => Uuid::new_v4().to_string(),
        other => other.to_string(),
    }
}

/// Decode, validate, and register a task for either RPC method.
///
/// On success the task is registered in pending state, its prior (for
/// continuations) has re-entered working, and the selected agent is
/// returned alongside it.
///
/// # Errors
///
/// Returns `AppError::InvalidParams` for undecodable params, invalid or
/// unsafe message content, or a continuation context mismatch;
/// `AppError::TaskNotFound` when a continuation references an unknown
/// task; `AppError::InvalidTaskState` for a duplicate task id or a
/// prior that is not awaiting input; `AppError::AgentNotFound` when the
/// selected agent id has no registered instance.
pub async fn prepare_task(
    state: &AppState,
    request: &JsonRpcRequest,
) -> Result<(Task, Arc<dyn Agent>)> {
    let params: MessageSendParams = serde_json::from_value(request.params.clone())
        .map_err(|err| AppError::InvalidParams(err.to_string()))?;
    params.message.validate()?;
    safety::screen_message(&params.message)?;

    // Read-only continuation checks happen before the new entry exists
    // so a rejected continuation leaves no trace in the registry.
    if let Some(prior_id) = &params.task_id {
        let prior = state
            .tasks
            .get(prior_id)
            .ok_or_else(|| AppError::TaskNotFound(format!("task {prior_id} not found")))?;
        if prior.context_id != params.context_id {
            return Err(AppError::InvalidParams(format!(
                "contextId does not match task {prior_id}"
            )));
        }
        if prior.state != TaskState::InputRequired {
            return Err(AppError::InvalidTaskState(format!(
                "task {prior_id} is not awaiting input"
            )));
        }
    }

    let agent_id = selector::select_agent(&state.agents, &params.message, &state.config.default_agent);
    let agent = state
        .agents
        .get(&agent_id)
        .ok_or_else(|| AppError::AgentNotFound(agent_id.clone()))?;

    let task = Task::new(
        task_id_from_request(&request.id_value()),
        agent_id,
        params.message,
        params.context_id,
        params.task_id,
    );
    state.tasks.create(task.clone())?;

    // Re-enter the prior under compare-and-transition; if another writer
    // got there first, roll back the new entry.
    if let Some(prior_id) = &task.continuation_of {
        match state
            .tasks
            .transition_if(prior_id, TaskState::InputRequired, TaskState::Working)
        {
            Ok(true) => {}
            Ok(false) => {
                state.tasks.remove(&task.id);
                return Err(AppError::InvalidTaskState(format!(
                    "task {prior_id} is not awaiting input"
                )));
            }
            Err(err) => {
                state.tasks.remove(&task.id);
                return Err(err);
            }
        }
    }

    if let Some(repo) = &state.store {
        if let Err(err) = repo.save_task(&task).await {
            warn!(task_id = %task.id, %err, "failed to save task to database");
        }
    }

    info!(
        task_id = %task.id,
        agent_id = %task.agent_id,
        context_id = task.context_id.as_deref().unwrap_or(""),
        "task created"
    );
    Ok((task, agent))
}

/// Handle `message/send`: execute the task to completion and return the
/// result payload for the response envelope.
///
/// # Errors
///
/// Propagates [`prepare_task`] errors, returns `AppError::Timeout` when
/// the agent exceeds its deadline, and `AppError::Agent` (or whatever
/// the agent raised) on execution failure. Every error outcome settles
/// the registry and store before returning.
pub async fn handle_send(state: &AppState, request: &JsonRpcRequest) -> Result<Value> {
    let (task, agent) = prepare_task(state, request).await?;
    let started = Instant::now();

    state.tasks.transition(&task.id, TaskState::Working)?;

    let outcome = tokio::time::timeout(state.config.agent_timeout(), agent.execute(&task)).await;
    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            settle_failure(state, &task, &err).await;
            return Err(err);
        }
        Err(_) => {
            let err = AppError::Timeout(format!(
                "agent execution exceeded {} seconds",
                state.config.timeouts.agent_seconds
            ));
            settle_failure(state, &task, &err).await;
            return Err(err);
        }
    };

    let final_state = match response.status.state {
        state if state.is_terminal() => state,
        TaskState::InputRequired => TaskState::InputRequired,
        _ => TaskState::Completed,
    };
    state.tasks.transition(&task.id, final_state)?;
    finalize_continuation(&state.tasks, &task, final_state);

    if let Some(repo) = &state.store {
        if let Err(err) = repo
            .update_status(&task.id, final_state, Some(&response), None)
            .await
        {
            warn!(task_id = %task.id, %err, "failed to update task status in database");
        }
    }

    // Input-required tasks stay registered awaiting their continuation;
    // everything else has been delivered and can go.
    if final_state.is_terminal() {
        state.tasks.remove(&task.id);
    }

    info!(
        task_id = %task.id,
        agent_id = %task.agent_id,
        state = %final_state,
        duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "task finished"
    );
    serde_json::to_value(&response)
        .map_err(|err| AppError::Internal(format!("failed to encode response: {err}")))
}

/// Record a failed execution in the registry and store, then drop the
/// entry. The prior of a continuation follows the same failure.
async fn settle_failure(state: &AppState, task: &Task, err: &AppError) {
    warn!(task_id = %task.id, agent_id = %task.agent_id, %err, "task failed");
    if let Err(registry_err) = state.tasks.transition(&task.id, TaskState::Failed) {
        warn!(task_id = %task.id, err = %registry_err, "failed to record task failure");
    }
    finalize_continuation(&state.tasks, task, TaskState::Failed);
    if let Some(repo) = &state.store {
        if let Err(db_err) = repo
            .update_status(&task.id, TaskState::Failed, None, Some(&err.to_string()))
            .await
        {
            warn!(task_id = %task.id, err = %db_err, "failed to update failed task in database");
        }
    }
    state.tasks.remove(&task.id);
}

/// Settle the prior task of a continuation to the continuation's final
/// state. Working priors follow the outcome (input-required pauses
/// again, terminal states finish and are dropped); a prior that some
/// other writer already settled is left alone.
pub(crate) fn finalize_continuation(tasks: &TaskRegistry, task: &Task, final_state: TaskState) {
    let Some(prior_id) = &task.continuation_of else {
        return;
    };
    match tasks.transition_if(prior_id, TaskState::Working, final_state) {
        Ok(true) => {
            if final_state.is_terminal() {
                tasks.remove(prior_id);
            }
        }
        Ok(false) => {}
        Err(err) => {
            warn!(task_id = %task.id, prior_id = %prior_id, %err, "failed to settle continuation prior");
        }
    }
}
