//! Task model and lifecycle helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;

/// Lifecycle state for a tracked task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Task created but execution has not begun.
    Pending,
    /// Agent execution in progress.
    Working,
    /// Task finished successfully.
    Completed,
    /// Task finished with a failure.
    Failed,
    /// Task abandoned before producing a terminal result.
    Cancelled,
    /// Agent paused awaiting further client input.
    InputRequired,
}

impl TaskState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Working)
                | (
                    TaskState::Working,
                    TaskState::Completed
                        | TaskState::Failed
                        | TaskState::Cancelled
                        | TaskState::InputRequired
                )
                | (TaskState::InputRequired, TaskState::Working)
        )
    }

    /// Whether this state ends the lifecycle.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Stable string form, matching the wire serialization.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::InputRequired => "input_required",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time status detail attached to responses and stream events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    /// Lifecycle state at this point.
    pub state: TaskState,
    /// Optional human-readable status message.
    #[serde(default)]
    pub message: Option<String>,
    /// Optional completion percentage (0–100).
    #[serde(default)]
    pub progress: Option<f64>,
    /// Failure description when `state` is failed.
    #[serde(default)]
    pub error: Option<String>,
    /// When this status was produced.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TaskStatus {
    /// Status for an in-progress task.
    #[must_use]
    pub fn working(message: Option<String>, progress: Option<f64>) -> Self {
        Self {
            state: TaskState::Working,
            message,
            progress,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Status for a successfully finished task.
    #[must_use]
    pub fn completed() -> Self {
        Self {
            state: TaskState::Completed,
            message: Some("Task completed successfully".into()),
            progress: Some(100.0),
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Status for a failed task carrying the failure description.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: TaskState::Failed,
            message: Some("Task failed".into()),
            progress: None,
            error: Some(error.into()),
            updated_at: Utc::now(),
        }
    }
}

/// Task domain entity tracked by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier among concurrently tracked tasks.
    pub id: String,
    /// Id of the agent selected to execute this task.
    pub agent_id: String,
    /// Inbound message the task was created from.
    pub message: Message,
    /// Optional conversation grouping identifier.
    pub context_id: Option<String>,
    /// Prior task this one continues, if any.
    pub continuation_of: Option<String>,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Free-form metadata supplied at submission.
    #[serde(default)]
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last state-change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Construct a new pending task.
    #[must_use]
    pub fn new(
        id: String,
        agent_id: String,
        message: Message,
        context_id: Option<String>,
        continuation_of: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            agent_id,
            message,
            context_id,
            continuation_of,
            state: TaskState::Pending,
            metadata: Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Final result payload returned for `message/send`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    /// Task identifier.
    pub id: String,
    /// Terminal (or paused) status of the task.
    pub status: TaskStatus,
    /// Agent's reply message, when one was produced.
    #[serde(default)]
    pub result: Option<Message>,
    /// Conversation grouping identifier, echoed from the request.
    #[serde(rename = "contextId", default)]
    pub context_id: Option<String>,
    /// When the response was produced.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskResponse {
    /// Build a completed response wrapping the agent's reply.
    #[must_use]
    pub fn completed(task_id: impl Into<String>, result: Message, context_id: Option<String>) -> Self {
        Self {
            id: task_id.into(),
            status: TaskStatus::completed(),
            result: Some(result),
            context_id,
            timestamp: Utc::now(),
        }
    }
}

/// Decoded parameters for `message/send` and `message/stream`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageSendParams {
    /// The message to dispatch.
    pub message: Message,
    /// Optional conversation grouping identifier.
    #[serde(rename = "contextId")]
    pub context_id: Option<String>,
    /// Optional prior task id this submission continues.
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
}
