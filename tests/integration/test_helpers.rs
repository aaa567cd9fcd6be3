//! Shared helpers for HTTP-level integration tests.
//!
//! Spawns the full server stack on an ephemeral port so individual
//! test modules can drive the protocol with a plain HTTP client and
//! inspect the live registry through the shared state handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agent_exchange::agents::simple::SimpleAgent;
use agent_exchange::agents::{Agent, AgentRegistry};
use agent_exchange::models::{AgentSkill, Task, TaskResponse};
use agent_exchange::server::{self, AppState};
use agent_exchange::{AppError, GlobalConfig};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// A running test server plus the handles tests need to observe it.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    ct: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

/// Config suitable for test isolation: localhost, short agent deadline,
/// generous rate limits so unrelated tests never trip admission.
pub fn test_config() -> GlobalConfig {
    GlobalConfig::from_toml_str(
        r#"
host = "127.0.0.1"

[limits]
rate_limit_rpm = 1000
rate_limit_burst = 1000

[timeouts]
agent_seconds = 5
stream_keepalive_seconds = 1
"#,
    )
    .expect("valid test config")
}

/// Registry holding one fast default agent.
pub fn default_agents(config: &GlobalConfig) -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents.register(
        &config.default_agent,
        Arc::new(
            SimpleAgent::new("Test Agent", "integration test agent", "hello from the agent")
                .with_delay(Duration::from_millis(5)),
        ),
    );
    agents
}

/// Spawn the server on an ephemeral port and wait for it to bind.
pub async fn spawn_server(mut config: GlobalConfig, agents: AgentRegistry) -> TestServer {
    // Discover a free port, release it, and hand it to the server.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    config.host = "127.0.0.1".to_owned();
    config.http_port = port;

    let state = AppState::new(config, agents, None);
    let ct = CancellationToken::new();

    let server_state = state.clone();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = server::serve(server_state, server_ct).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    TestServer {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
        ct,
    }
}

/// Spawn a server with the standard test config and default agent.
pub async fn spawn_default_server() -> TestServer {
    let config = test_config();
    let agents = default_agents(&config);
    spawn_server(config, agents).await
}

/// Build a `message/send` envelope with one text part.
#[must_use]
pub fn send_envelope(id: &str, text: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "message/send",
        "params": {
            "message": {
                "role": "user",
                "parts": [{ "kind": "text", "text": text }],
            },
        },
        "id": id,
    })
}

/// Build a `message/stream` envelope with one text part.
#[must_use]
pub fn stream_envelope(id: &str, text: &str) -> Value {
    let mut envelope = send_envelope(id, text);
    envelope["method"] = json!("message/stream");
    envelope
}

/// Parse an SSE body into the JSON payload of each data frame,
/// skipping keep-alive comments.
#[must_use]
pub fn sse_frames(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .map(|data| serde_json::from_str(data).expect("frame is valid JSON"))
        .collect()
}

/// Agent whose execution always fails, for error-path tests.
///
/// Routes on the word "explode" so tests can target it explicitly
/// alongside the default agent.
pub struct FailingAgent {
    skills: Vec<AgentSkill>,
}

impl FailingAgent {
    #[must_use]
    pub fn new() -> Self {
        let skill = AgentSkill::new("explode", "Explode", "Always fails")
            .with_examples(vec!["explode".into()]);
        Self {
            skills: vec![skill],
        }
    }
}

impl Agent for FailingAgent {
    fn name(&self) -> &str {
        "Failing Agent"
    }

    fn description(&self) -> &str {
        "Fails every task"
    }

    fn skills(&self) -> &[AgentSkill] {
        &self.skills
    }

    fn execute<'a>(
        &'a self,
        _task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = agent_exchange::Result<TaskResponse>> + Send + 'a>> {
        Box::pin(async move { Err(AppError::Agent("simulated agent failure".into())) })
    }
}
