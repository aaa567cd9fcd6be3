use agent_exchange::models::MessageSendParams;
use agent_exchange::rpc::{
    decode_request, parse_value, JsonRpcRequest, JsonRpcResponse, RpcError, PROTOCOL_VERSION,
};
use agent_exchange::AppError;
use serde_json::{json, Value};

#[test]
fn request_round_trip_preserves_message() {
    let raw = json!({
        "jsonrpc": "2.0",
        "method": "message/send",
        "params": {
            "message": {
                "role": "user",
                "parts": [{ "kind": "text", "text": "hi" }],
            },
        },
        "id": "t1",
    });

    let request = decode_request(raw).expect("request decodes");
    assert_eq!(request.method, "message/send");
    assert_eq!(request.id_value(), json!("t1"));

    let params: MessageSendParams =
        serde_json::from_value(request.params).expect("params decode");
    assert_eq!(params.message.parts.len(), 1);
    assert_eq!(params.message.text_content(), "hi");
    assert!(params.context_id.is_none());
    assert!(params.task_id.is_none());
}

#[test]
fn encoded_request_decodes_to_equivalent() {
    let request = JsonRpcRequest {
        jsonrpc: PROTOCOL_VERSION.to_owned(),
        method: "message/stream".to_owned(),
        params: json!({ "message": { "role": "user", "parts": [{ "kind": "text", "text": "go" }] } }),
        id: Some(json!(7)),
    };

    let encoded = serde_json::to_value(&request).expect("request encodes");
    let decoded = decode_request(encoded).expect("request decodes");
    assert_eq!(decoded, request);
}

#[test]
fn missing_method_is_invalid_request() {
    let raw = json!({ "jsonrpc": "2.0", "params": {}, "id": 1 });
    match decode_request(raw) {
        Err(AppError::InvalidRequest(_)) => {}
        other => panic!("expected invalid request, got {other:?}"),
    }
}

#[test]
fn non_object_body_is_invalid_request() {
    match decode_request(json!([1, 2, 3])) {
        Err(AppError::InvalidRequest(_)) => {}
        other => panic!("expected invalid request, got {other:?}"),
    }
}

#[test]
fn absent_params_and_id_default() {
    let request = decode_request(json!({ "method": "message/send" })).expect("request decodes");
    assert_eq!(request.params, Value::Null);
    assert_eq!(request.id_value(), Value::Null);
}

#[test]
fn parse_value_rejects_malformed_json() {
    match parse_value("{ not json") {
        Err(AppError::Parse(_)) => {}
        other => panic!("expected parse error, got {other:?}"),
    }
    assert!(parse_value(r#"{"method": "message/send"}"#).is_ok());
}

#[test]
fn success_envelope_serializes_null_error() {
    let envelope = JsonRpcResponse::result(json!("t1"), json!({ "ok": true }));
    let encoded = serde_json::to_value(&envelope).expect("envelope encodes");

    assert_eq!(encoded["jsonrpc"], json!("2.0"));
    assert_eq!(encoded["id"], json!("t1"));
    assert_eq!(encoded["result"], json!({ "ok": true }));
    // The unpopulated side must be an explicit null key, not absent.
    assert!(encoded.as_object().expect("object").contains_key("error"));
    assert_eq!(encoded["error"], Value::Null);
}

#[test]
fn error_envelope_serializes_null_result() {
    let envelope = JsonRpcResponse::error(
        json!(3),
        RpcError {
            code: -32601,
            message: "method not found: foo/bar".into(),
            data: None,
        },
    );
    let encoded = serde_json::to_value(&envelope).expect("envelope encodes");

    assert!(encoded.as_object().expect("object").contains_key("result"));
    assert_eq!(encoded["result"], Value::Null);
    assert_eq!(encoded["error"]["code"], json!(-32601));
    assert_eq!(encoded["id"], json!(3));
}

#[test]
fn app_error_envelope_carries_code_and_message() {
    let err = AppError::MethodNotFound("foo/bar".into());
    let envelope = JsonRpcResponse::from_app_error(json!("req-9"), &err);

    assert!(envelope.result.is_none());
    let rpc_err = envelope.error.expect("error populated");
    assert_eq!(rpc_err.code, -32601);
    assert_eq!(rpc_err.message, "method not found: foo/bar");
    assert_eq!(envelope.id, json!("req-9"));
}

#[test]
fn error_data_omitted_when_absent() {
    let envelope = JsonRpcResponse::error(
        Value::Null,
        RpcError {
            code: -32602,
            message: "invalid params".into(),
            data: None,
        },
    );
    let encoded = serde_json::to_value(&envelope).expect("envelope encodes");
    assert!(
        !encoded["error"].as_object().expect("object").contains_key("data"),
        "null data should not be serialized"
    );
}
