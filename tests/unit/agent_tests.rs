use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use agent_exchange::agents::simple::SimpleAgent;
use agent_exchange::agents::{event_channel, Agent, AgentRegistry, EventSender};
use agent_exchange::models::{Message, StreamEvent, Task, TaskResponse, TaskState};
use agent_exchange::AppError;
use tokio_util::sync::CancellationToken;

fn sample_task(text: &str) -> Task {
    Task::new(
        "task-1".into(),
        "default".into(),
        Message::user_text(text),
        Some("ctx-1".into()),
        None,
    )
}

/// Minimal agent without a streaming implementation, used to exercise
/// the default bridge.
struct CannedAgent;

impl Agent for CannedAgent {
    fn name(&self) -> &str {
        "Canned Agent"
    }

    fn description(&self) -> &str {
        "Always replies with the same text"
    }

    fn skills(&self) -> &[agent_exchange::models::AgentSkill] {
        &[]
    }

    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = agent_exchange::Result<TaskResponse>> + Send + 'a>> {
        Box::pin(async move {
            Ok(TaskResponse::completed(
                &task.id,
                Message::agent_text("canned reply"),
                task.context_id.clone(),
            ))
        })
    }
}

#[tokio::test]
async fn simple_agent_execute_returns_completed_response() {
    let agent = SimpleAgent::new("Test Agent", "test", "hello back");
    let task = sample_task("hi there");

    let response = agent.execute(&task).await.expect("execute succeeds");

    assert_eq!(response.id, "task-1");
    assert_eq!(response.status.state, TaskState::Completed);
    assert_eq!(response.context_id.as_deref(), Some("ctx-1"));
    let reply = response.result.expect("response carries a message");
    assert_eq!(reply.text_content(), "hello back");
}

#[test]
fn simple_agent_reports_identity_and_skills() {
    let agent = SimpleAgent::new("Test Agent", "a test agent", "pong");

    assert_eq!(agent.name(), "Test Agent");
    assert_eq!(agent.description(), "a test agent");
    assert_eq!(agent.version(), "1.0.0");
    assert_eq!(agent.skills().len(), 1);
    assert_eq!(agent.skills()[0].id, "simple_response");
    assert!(agent.capabilities().streaming);
}

#[tokio::test]
async fn simple_agent_streaming_emits_working_then_final_message() {
    let agent = SimpleAgent::new("Test Agent", "test", "streamed reply")
        .with_delay(Duration::from_millis(5));
    let task = sample_task("hi");
    let (sender, mut rx) = event_channel(8, CancellationToken::new());

    agent
        .execute_streaming(&task, sender)
        .await
        .expect("streaming succeeds");

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamEvent::StatusUpdate {
            task_id,
            status,
            is_final,
            ..
        } => {
            assert_eq!(task_id, "task-1");
            assert_eq!(status.state, TaskState::Working);
            assert!(!is_final);
        }
        other => panic!("expected a working status first, got {other:?}"),
    }
    match &events[1] {
        StreamEvent::Message {
            message, is_final, ..
        } => {
            assert!(is_final, "last event must carry the final flag");
            assert_eq!(message.text_content(), "streamed reply");
        }
        other => panic!("expected a final message event, got {other:?}"),
    }
}

#[tokio::test]
async fn default_bridge_streams_execute_result() {
    let agent = CannedAgent;
    let task = sample_task("hi");
    let (sender, mut rx) = event_channel(8, CancellationToken::new());

    agent
        .execute_streaming(&task, sender)
        .await
        .expect("bridge succeeds");

    let first = rx.recv().await.expect("working event");
    assert!(!first.is_final());
    let second = rx.recv().await.expect("final event");
    assert!(second.is_final());
    assert!(rx.recv().await.is_none(), "bridge sends exactly two events");
}

#[tokio::test]
async fn event_sender_rejects_after_cancellation() {
    let cancel = CancellationToken::new();
    let (sender, _rx) = event_channel(1, cancel.clone());
    cancel.cancel();

    assert!(sender.is_cancelled());
    let result = sender
        .send(StreamEvent::working("task-1", "working", None))
        .await;
    match result {
        Err(AppError::Cancelled(_)) => {}
        other => panic!("expected cancelled error, got {other:?}"),
    }
}

#[tokio::test]
async fn event_sender_rejects_when_receiver_dropped() {
    let (sender, rx) = event_channel(1, CancellationToken::new());
    drop(rx);

    let result = sender
        .send(StreamEvent::working("task-1", "working", None))
        .await;
    match result {
        Err(AppError::Cancelled(_)) => {}
        other => panic!("expected cancelled error, got {other:?}"),
    }
}

#[test]
fn registry_preserves_registration_order() {
    let mut agents = AgentRegistry::new();
    assert!(agents.is_empty());

    agents.register("alpha", Arc::new(SimpleAgent::new("Alpha", "first", "a")));
    agents.register("beta", Arc::new(SimpleAgent::new("Beta", "second", "b")));

    assert_eq!(agents.len(), 2);
    assert_eq!(agents.ids(), vec!["alpha".to_owned(), "beta".to_owned()]);
    assert!(agents.contains("alpha"));
    assert!(!agents.contains("gamma"));
    assert!(agents.get("gamma").is_none());
}

#[test]
fn reregistering_replaces_agent_in_place() {
    let mut agents = AgentRegistry::new();
    agents.register("alpha", Arc::new(SimpleAgent::new("Alpha", "first", "a")));
    agents.register("beta", Arc::new(SimpleAgent::new("Beta", "second", "b")));
    agents.register(
        "alpha",
        Arc::new(SimpleAgent::new("Alpha v2", "replacement", "a2")),
    );

    assert_eq!(agents.len(), 2);
    assert_eq!(
        agents.ids(),
        vec!["alpha".to_owned(), "beta".to_owned()],
        "replacement keeps the original routing position"
    );
    let replaced = agents.get("alpha").expect("alpha still registered");
    assert_eq!(replaced.name(), "Alpha v2");
}

/// A sender cloned into a helper keeps working until the consumer goes
/// away, even while the original is still alive.
#[tokio::test]
async fn cloned_sender_shares_the_channel() {
    let (sender, mut rx) = event_channel(4, CancellationToken::new());
    let clone: EventSender = sender.clone();

    clone
        .send(StreamEvent::working("task-1", "working", Some(10.0)))
        .await
        .expect("clone can send");
    drop(clone);
    drop(sender);

    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_none());
}
