//! Integration tests for bearer authentication at the RPC boundary.

use agent_exchange::auth::issue_token;
use serde_json::{json, Value};

use super::test_helpers::{default_agents, send_envelope, spawn_server, test_config};

const SECRET: &str = "integration-test-secret";

async fn spawn_auth_server(required: bool) -> super::test_helpers::TestServer {
    let mut config = test_config();
    config.auth.required = required;
    config.auth.secret = SECRET.to_owned();
    let agents = default_agents(&config);
    spawn_server(config, agents).await
}

#[tokio::test]
async fn missing_token_is_rejected_when_auth_required() {
    let server = spawn_auth_server(true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/rpc", server.base_url))
        .json(&send_envelope("a1", "hi"))
        .send()
        .await
        .expect("POST /rpc");

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"]["code"], json!(-32003));
    assert_eq!(body["result"], Value::Null);
}

#[tokio::test]
async fn valid_token_is_accepted() {
    let server = spawn_auth_server(true).await;
    let client = reqwest::Client::new();
    let token = issue_token(SECRET, "test-client", 3600).expect("token issues");

    let resp = client
        .post(format!("{}/rpc", server.base_url))
        .bearer_auth(token)
        .json(&send_envelope("a2", "hi"))
        .send()
        .await
        .expect("POST /rpc");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["result"]["status"]["state"], json!("completed"));
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let server = spawn_auth_server(true).await;
    let client = reqwest::Client::new();
    let forged = issue_token("some-other-secret", "intruder", 3600).expect("token issues");

    let resp = client
        .post(format!("{}/rpc", server.base_url))
        .bearer_auth(forged)
        .json(&send_envelope("a3", "hi"))
        .send()
        .await
        .expect("POST /rpc");

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"]["code"], json!(-32003));
}

#[tokio::test]
async fn anonymous_requests_pass_when_auth_optional() {
    let server = spawn_auth_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/rpc", server.base_url))
        .json(&send_envelope("a4", "hi"))
        .send()
        .await
        .expect("POST /rpc");

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn presented_token_is_still_validated_when_auth_optional() {
    let server = spawn_auth_server(false).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/rpc", server.base_url))
        .bearer_auth("definitely-not-a-jwt")
        .json(&send_envelope("a5", "hi"))
        .send()
        .await
        .expect("POST /rpc");

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn health_endpoint_needs_no_token() {
    let server = spawn_auth_server(true).await;

    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .expect("GET /health");
    assert_eq!(resp.status(), 200);
}
