//! Stream event model for incremental task output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::message::Message;
use super::task::{TaskState, TaskStatus};

/// One incremental unit of an agent's streaming output.
///
/// Every event names its owning task and carries a `final` flag; the
/// streaming pipeline guarantees at most one final event reaches the
/// wire per task, and that it is the last frame observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Lifecycle/progress notification.
    StatusUpdate {
        /// Owning task id.
        #[serde(rename = "taskId")]
        task_id: String,
        /// Status detail at this point in the stream.
        status: TaskStatus,
        /// Whether this event ends the stream.
        #[serde(rename = "final")]
        is_final: bool,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },
    /// Incremental artifact content.
    ArtifactUpdate {
        /// Owning task id.
        #[serde(rename = "taskId")]
        task_id: String,
        /// Artifact payload chunk.
        artifact: Value,
        /// Whether this chunk completes the artifact.
        #[serde(rename = "lastChunk")]
        last_chunk: bool,
        /// Whether this event ends the stream.
        #[serde(rename = "final")]
        is_final: bool,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },
    /// Complete reply message.
    Message {
        /// Owning task id.
        #[serde(rename = "taskId")]
        task_id: String,
        /// The reply message.
        message: Message,
        /// Whether this event ends the stream.
        #[serde(rename = "final")]
        is_final: bool,
        /// When the event was produced.
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    /// Build a status-update event.
    #[must_use]
    pub fn status(task_id: impl Into<String>, status: TaskStatus, is_final: bool) -> Self {
        Self::StatusUpdate {
            task_id: task_id.into(),
            status,
            is_final,
            timestamp: Utc::now(),
        }
    }

    /// Build a non-final working status-update with optional progress.
    #[must_use]
    pub fn working(
        task_id: impl Into<String>,
        message: impl Into<String>,
        progress: Option<f64>,
    ) -> Self {
        Self::status(
            task_id,
            TaskStatus::working(Some(message.into()), progress),
            false,
        )
    }

    /// Build an artifact-update event.
    #[must_use]
    pub fn artifact(
        task_id: impl Into<String>,
        artifact: Value,
        last_chunk: bool,
        is_final: bool,
    ) -> Self {
        Self::ArtifactUpdate {
            task_id: task_id.into(),
            artifact,
            last_chunk,
            is_final,
            timestamp: Utc::now(),
        }
    }

    /// Build a message event.
    #[must_use]
    pub fn message(task_id: impl Into<String>, message: Message, is_final: bool) -> Self {
        Self::Message {
            task_id: task_id.into(),
            message,
            is_final,
            timestamp: Utc::now(),
        }
    }

    /// Build the terminal failure event the pipeline synthesizes when an
    /// agent errors out or ends its stream without a final frame.
    #[must_use]
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::status(task_id, TaskStatus::failed(error), true)
    }

    /// Owning task id.
    #[must_use]
    pub fn task_id(&self) -> &str {
        match self {
            Self::StatusUpdate { task_id, .. }
            | Self::ArtifactUpdate { task_id, .. }
            | Self::Message { task_id, .. } => task_id,
        }
    }

    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_final(&self) -> bool {
        match self {
            Self::StatusUpdate { is_final, .. }
            | Self::ArtifactUpdate { is_final, .. }
            | Self::Message { is_final, .. } => *is_final,
        }
    }

    /// Registry state implied when this event closes the stream.
    ///
    /// Final status-updates carry their own state (terminal states and
    /// the input-required pause pass through); final artifact and message
    /// events imply successful completion.
    #[must_use]
    pub fn implied_state(&self) -> TaskState {
        match self {
            Self::StatusUpdate { status, .. } => match status.state {
                state if state.is_terminal() => state,
                TaskState::InputRequired => TaskState::InputRequired,
                _ => TaskState::Completed,
            },
            Self::ArtifactUpdate { .. } | Self::Message { .. } => TaskState::Completed,
        }
    }
}
