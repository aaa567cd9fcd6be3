use agent_exchange::AppError;
use serde_json::json;

#[test]
fn every_variant_maps_to_its_stable_code() {
    let cases: Vec<(AppError, i32)> = vec![
        (AppError::Parse("bad".into()), -32700),
        (AppError::InvalidRequest("bad".into()), -32600),
        (AppError::MethodNotFound("foo/bar".into()), -32601),
        (AppError::InvalidParams("bad".into()), -32602),
        (AppError::AgentNotFound("ghost".into()), -32000),
        (AppError::TaskNotFound("t1".into()), -32001),
        (AppError::InvalidTaskState("dup".into()), -32002),
        (AppError::Unauthorized("no".into()), -32003),
        (AppError::RateLimited { retry_after: 5 }, -32004),
        (AppError::Agent("boom".into()), 4001),
        (AppError::Timeout("slow".into()), 5001),
        (AppError::Config("bad".into()), -32603),
        (AppError::Db("locked".into()), -32603),
        (AppError::Cancelled("gone".into()), -32603),
        (AppError::Internal("oops".into()), -32603),
    ];

    for (err, expected) in cases {
        assert_eq!(err.jsonrpc_code(), expected, "wrong code for {err}");
    }
}

#[test]
fn domain_errors_keep_their_message() {
    let err = AppError::InvalidParams("message must contain at least one part".into());
    let rpc = err.to_rpc_error();
    assert_eq!(rpc.code, -32602);
    assert!(rpc.message.contains("at least one part"));
}

#[test]
fn agent_failure_message_reaches_the_wire() {
    let err = AppError::Agent("weather service unavailable".into());
    let rpc = err.to_rpc_error();
    assert_eq!(rpc.code, 4001);
    assert!(rpc.message.contains("weather service unavailable"));
}

#[test]
fn internal_details_are_scrubbed() {
    let leaky = [
        AppError::Internal("panicked at /src/secret/path.rs:42".into()),
        AppError::Db("sqlite file /var/lib/tasks.db is locked".into()),
        AppError::Config("secret missing from /etc/keys".into()),
        AppError::Cancelled("consumer dropped".into()),
    ];

    for err in leaky {
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.message, "Internal server error");
        assert!(rpc.data.is_none());
    }
}

#[test]
fn rate_limited_carries_retry_after_hint() {
    let err = AppError::RateLimited { retry_after: 42 };
    let rpc = err.to_rpc_error();

    assert_eq!(rpc.code, -32004);
    assert!(rpc.message.contains("retry after 42s"));
    assert_eq!(rpc.data, Some(json!({ "retryAfter": 42 })));
}

#[test]
fn display_prefixes_the_failure_area() {
    assert_eq!(
        AppError::TaskNotFound("task t9 not found".to_string()).to_string(),
        "task not found: task t9 not found"
    );
    assert_eq!(
        AppError::Timeout("agent execution exceeded 300 seconds".to_string()).to_string(),
        "timeout: agent execution exceeded 300 seconds"
    );
}

#[test]
fn toml_error_converts_to_config() {
    let parse_failure = toml::from_str::<toml::Value>("not [ valid").expect_err("invalid toml");
    let err: AppError = parse_failure.into();
    assert!(matches!(err, AppError::Config(_)));
    assert_eq!(err.jsonrpc_code(), -32603);
}
