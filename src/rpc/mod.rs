//! JSON-RPC envelope structures and codec helpers.

pub mod envelope;

pub use envelope::{
    decode_request, parse_value, JsonRpcRequest, JsonRpcResponse, RpcError, PROTOCOL_VERSION,
};
