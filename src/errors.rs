//! Error types shared across the application.
//!
//! Every failure that can reach a client is mapped onto a stable
//! JSON-RPC error code here, so the wire surface never depends on
//! where inside the engine the failure originated.

use std::fmt::{Display, Formatter};

use crate::rpc::RpcError;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Request body is not parseable JSON.
    Parse(String),
    /// Body parsed but is not a valid JSON-RPC request envelope.
    InvalidRequest(String),
    /// Method string is not one of the recognized RPC methods.
    MethodNotFound(String),
    /// Params failed to decode or a message failed validation.
    InvalidParams(String),
    /// Router selected an agent id with no registered instance.
    AgentNotFound(String),
    /// Continuation referenced a task id not present in the registry.
    TaskNotFound(String),
    /// Duplicate task id or an illegal lifecycle transition.
    InvalidTaskState(String),
    /// Bearer token missing or failed validation.
    Unauthorized(String),
    /// Admission controller rejected the client.
    RateLimited {
        /// Seconds until the rejecting window frees a slot.
        retry_after: u64,
    },
    /// Failure raised inside agent execution logic.
    Agent(String),
    /// Agent execution exceeded its configured deadline.
    Timeout(String),
    /// Stream consumer went away; execution was cancelled cooperatively.
    Cancelled(String),
    /// Uncategorized failure; message is scrubbed before reaching clients.
    Internal(String),
}

/// JSON-RPC error code space used on the wire.
///
/// Protocol-level failures use the reserved `-327xx` codes, A2A domain
/// failures use the `-3200x` server range, and agent/timeout failures
/// keep their historical positive codes.
pub mod code {
    /// Envelope body is not parseable JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Body is valid JSON but not a request envelope.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unrecognized method string.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Params failed to decode or validate.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Scrubbed internal failure.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// No registered agent under the selected id.
    pub const AGENT_NOT_FOUND: i32 = -32000;
    /// Referenced task is not live.
    pub const TASK_NOT_FOUND: i32 = -32001;
    /// Duplicate id or illegal lifecycle transition.
    pub const INVALID_TASK_STATE: i32 = -32002;
    /// Authentication required or rejected.
    pub const AUTHENTICATION_REQUIRED: i32 = -32003;
    /// Admission controller rejected the client.
    pub const RATE_LIMIT_EXCEEDED: i32 = -32004;
    /// Failure raised inside agent logic.
    pub const AGENT_EXECUTION: i32 = 4001;
    /// Execution exceeded its deadline.
    pub const TIMEOUT: i32 = 5001;
}

impl AppError {
    /// Stable JSON-RPC code for this failure kind.
    #[must_use]
    pub fn jsonrpc_code(&self) -> i32 {
        match self {
            Self::Parse(_) => code::PARSE_ERROR,
            Self::InvalidRequest(_) => code::INVALID_REQUEST,
            Self::MethodNotFound(_) => code::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => code::INVALID_PARAMS,
            Self::AgentNotFound(_) => code::AGENT_NOT_FOUND,
            Self::TaskNotFound(_) => code::TASK_NOT_FOUND,
            Self::InvalidTaskState(_) => code::INVALID_TASK_STATE,
            Self::Unauthorized(_) => code::AUTHENTICATION_REQUIRED,
            Self::RateLimited { .. } => code::RATE_LIMIT_EXCEEDED,
            Self::Agent(_) => code::AGENT_EXECUTION,
            Self::Timeout(_) => code::TIMEOUT,
            Self::Config(_) | Self::Db(_) | Self::Cancelled(_) | Self::Internal(_) => {
                code::INTERNAL_ERROR
            }
        }
    }

    /// Whether this failure kind may expose its message to clients.
    ///
    /// Config, persistence, cancellation, and uncategorized failures are
    /// scrubbed; everything else carries a message the caller needs.
    #[must_use]
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Db(_) | Self::Cancelled(_) | Self::Internal(_)
        )
    }

    /// Convert into the wire-level error object.
    ///
    /// Internal failure details (paths, driver messages) never leak: any
    /// non-domain variant becomes a generic "Internal server error".
    #[must_use]
    pub fn to_rpc_error(&self) -> RpcError {
        let message = if self.is_domain() {
            self.to_string()
        } else {
            "Internal server error".to_owned()
        };
        let data = match self {
            Self::RateLimited { retry_after } => {
                Some(serde_json::json!({ "retryAfter": retry_after }))
            }
            _ => None,
        };
        RpcError {
            code: self.jsonrpc_code(),
            message,
            data,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::MethodNotFound(method) => write!(f, "method not found: {method}"),
            Self::InvalidParams(msg) => write!(f, "invalid params: {msg}"),
            Self::AgentNotFound(agent_id) => write!(f, "agent not found: {agent_id}"),
            Self::TaskNotFound(task_id) => write!(f, "task not found: {task_id}"),
            Self::InvalidTaskState(msg) => write!(f, "invalid task state: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::RateLimited { retry_after } => {
                write!(f, "rate limit exceeded, retry after {retry_after}s")
            }
            Self::Agent(msg) => write!(f, "agent execution failed: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}
