//! JSON-RPC 2.0 request/response envelope codec.
//!
//! Responses always carry both `result` and `error` keys with exactly one
//! of them non-null, and echo the request `id` (null when the request id
//! could not be recovered). Error objects carry a stable numeric code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppError, Result};

/// JSON-RPC protocol version emitted in every envelope.
pub const PROTOCOL_VERSION: &str = "2.0";

fn default_version() -> String {
    PROTOCOL_VERSION.to_owned()
}

/// Inbound request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version marker.
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    /// Method to invoke.
    pub method: String,
    /// Method parameters; object or absent.
    #[serde(default)]
    pub params: Value,
    /// Request identifier echoed in the response; string, number, or null.
    #[serde(default)]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Request id as a concrete JSON value, null when absent.
    #[must_use]
    pub fn id_value(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

/// Wire-level error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    /// Stable numeric error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail (e.g. a retry-after hint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outbound response envelope.
///
/// `result` and `error` are both always serialized so clients can rely
/// on the unpopulated side being an explicit null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version marker.
    pub jsonrpc: String,
    /// Successful result payload, or null.
    pub result: Option<Value>,
    /// Failure payload, or null.
    pub error: Option<RpcError>,
    /// Echoed request identifier.
    pub id: Value,
}

impl JsonRpcResponse {
    /// Build a success envelope.
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_owned(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Build an error envelope.
    #[must_use]
    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: PROTOCOL_VERSION.to_owned(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Build an error envelope from an application failure.
    #[must_use]
    pub fn from_app_error(id: Value, err: &AppError) -> Self {
        Self::error(id, err.to_rpc_error())
    }
}

/// Parse a raw request body into a JSON value.
///
/// # Errors
///
/// Returns `AppError::Parse` when the body is not valid JSON.
pub fn parse_value(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|err| AppError::Parse(err.to_string()))
}

/// Decode a parsed JSON value into a request envelope.
///
/// # Errors
///
/// Returns `AppError::InvalidRequest` when the value is not a valid
/// JSON-RPC request object (wrong shape, missing method).
pub fn decode_request(value: Value) -> Result<JsonRpcRequest> {
    serde_json::from_value(value).map_err(|err| AppError::InvalidRequest(err.to_string()))
}
