//! Task repository for `SQLite` persistence.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{Task, TaskResponse, TaskState};
use crate::{AppError, Result};

/// Stored task row.
///
/// Timestamps and JSON payloads stay in their stored text form; the
/// registry, not the database, is the authority for live state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: String,
    /// Agent the task was dispatched to.
    pub agent_id: String,
    /// Conversation grouping identifier.
    pub context_id: Option<String>,
    /// Prior task this one continued.
    pub continuation_of: Option<String>,
    /// Lifecycle state at last write.
    pub status: String,
    /// Inbound message, JSON-encoded.
    pub message: String,
    /// Final response, JSON-encoded.
    pub result: Option<String>,
    /// Failure description when the task failed.
    pub error_message: Option<String>,
    /// Creation timestamp, RFC 3339.
    pub created_at: String,
    /// Last-update timestamp, RFC 3339.
    pub updated_at: String,
    /// Terminal timestamp, RFC 3339, set on completion or failure.
    pub completed_at: Option<String>,
}

/// Repository wrapper around `SQLite` for task records.
#[derive(Clone)]
pub struct TaskRepo {
    pool: SqlitePool,
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new task record.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the insert fails.
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        let message = serde_json::to_string(&task.message)
            .map_err(|err| AppError::Db(format!("failed to encode message: {err}")))?;
        sqlx::query(
            r"
INSERT INTO tasks (id, agent_id, context_id, continuation_of, status, message, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&task.id)
        .bind(&task.agent_id)
        .bind(&task.context_id)
        .bind(&task.continuation_of)
        .bind(task.state.as_str())
        .bind(message)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update a task's status, result, and error columns.
    ///
    /// `completed_at` is stamped the first time the task reaches
    /// completed or failed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialization or the update fails.
    pub async fn update_status(
        &self,
        task_id: &str,
        state: TaskState,
        result: Option<&TaskResponse>,
        error: Option<&str>,
    ) -> Result<()> {
        let result = result
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| AppError::Db(format!("failed to encode result: {err}")))?;
        sqlx::query(
            r"
UPDATE tasks
SET status = ?,
    result = ?,
    error_message = ?,
    updated_at = ?,
    completed_at = CASE WHEN ? IN ('completed', 'failed') THEN ? ELSE completed_at END
WHERE id = ?
            ",
        )
        .bind(state.as_str())
        .bind(result)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(state.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Retrieve a task record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<TaskRecord>> {
        let record = sqlx::query_as::<_, TaskRecord>(
            r"
SELECT id, agent_id, context_id, continuation_of, status, message, result,
       error_message, created_at, updated_at, completed_at
FROM tasks
WHERE id = ?
            ",
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// List recent task records for one agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn tasks_by_agent(&self, agent_id: &str, limit: i64) -> Result<Vec<TaskRecord>> {
        let records = sqlx::query_as::<_, TaskRecord>(
            r"
SELECT id, agent_id, context_id, continuation_of, status, message, result,
       error_message, created_at, updated_at, completed_at
FROM tasks
WHERE agent_id = ?
ORDER BY created_at DESC
LIMIT ?
            ",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
