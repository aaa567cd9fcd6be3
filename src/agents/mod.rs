//! Agent abstraction and registry.
//!
//! The [`Agent`] trait decouples the protocol engine (router, streaming
//! pipeline, registries) from task execution logic. Implementations
//! describe themselves through skills and capabilities for the discovery
//! document and execute tasks either synchronously or by emitting
//! [`StreamEvent`]s into a bounded channel.

pub mod simple;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, Result};
use crate::models::{AgentCapabilities, AgentSkill, StreamEvent, Task, TaskResponse};

/// Pluggable task executor.
///
/// Agents are registered once at startup and shared immutably across
/// requests; implementations must be safe to call concurrently.
pub trait Agent: Send + Sync {
    /// Display name used in the discovery document.
    fn name(&self) -> &str;

    /// Human-readable description of what the agent does.
    fn description(&self) -> &str;

    /// Agent version advertised in the discovery document.
    fn version(&self) -> &str {
        "1.0.0"
    }

    /// Skills this agent offers; examples double as routing triggers.
    fn skills(&self) -> &[AgentSkill];

    /// Capability flags advertised in the discovery document.
    fn capabilities(&self) -> AgentCapabilities {
        AgentCapabilities::default()
    }

    /// Execute a task to completion and return the final response.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Agent`](crate::AppError::Agent) for failures
    /// inside agent logic. The dispatcher maps any error onto a failed
    /// task and a wire-level error envelope.
    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResponse>> + Send + 'a>>;

    /// Execute a task incrementally, emitting events into `events`.
    ///
    /// Implementations end the stream by sending exactly one event with
    /// its final flag set. The default implementation bridges
    /// non-streaming agents: a working status, then [`Self::execute`],
    /// then the response as a final frame.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Agent`](crate::AppError::Agent) for failures
    /// inside agent logic and [`AppError::Cancelled`](crate::AppError::Cancelled)
    /// when the consumer went away mid-stream. The pipeline synthesizes
    /// the terminal frame for any error outcome.
    fn execute_streaming<'a>(
        &'a self,
        task: &'a Task,
        events: EventSender,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            events
                .send(StreamEvent::working(
                    &task.id,
                    "Processing request...",
                    Some(50.0),
                ))
                .await?;
            let response = self.execute(task).await?;
            let event = match response.result {
                Some(message) => StreamEvent::message(&task.id, message, true),
                None => StreamEvent::status(&task.id, response.status, true),
            };
            events.send(event).await?;
            Ok(())
        })
    }
}

/// Sending half of a task's event channel.
///
/// Wired to the stream's cancellation token so a producer blocked on a
/// full channel wakes up as soon as the consumer goes away instead of
/// parking forever.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSender {
    /// Send one event, waiting for channel capacity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cancelled`] when the stream consumer has gone
    /// away; producers should stop work and return promptly.
    pub async fn send(&self, event: StreamEvent) -> Result<()> {
        tokio::select! {
            () = self.cancel.cancelled() => {
                Err(AppError::Cancelled("stream consumer went away".into()))
            }
            sent = self.tx.send(event) => {
                sent.map_err(|_| AppError::Cancelled("event channel closed".into()))
            }
        }
    }

    /// Whether the consumer has already gone away.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Create a bounded event channel whose sender observes `cancel`.
#[must_use]
pub fn event_channel(
    capacity: usize,
    cancel: CancellationToken,
) -> (EventSender, mpsc::Receiver<StreamEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender { tx, cancel }, rx)
}

/// Registry of executable agents keyed by agent id.
///
/// Registration order is preserved and drives routing tie-breaks. The
/// registry is populated at startup and shared immutably afterwards, so
/// lookups take no lock.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<(String, Arc<dyn Agent>)>,
}

impl AgentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under `agent_id`.
    ///
    /// Re-registering an existing id replaces the agent in place,
    /// keeping its original position in the routing order.
    pub fn register(&mut self, agent_id: impl Into<String>, agent: Arc<dyn Agent>) {
        let agent_id = agent_id.into();
        if let Some(slot) = self.agents.iter_mut().find(|(id, _)| *id == agent_id) {
            slot.1 = agent;
        } else {
            self.agents.push((agent_id, agent));
        }
    }

    /// Look up an agent by id.
    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, agent)| Arc::clone(agent))
    }

    /// Whether an agent is registered under `agent_id`.
    #[must_use]
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|(id, _)| id == agent_id)
    }

    /// Iterate `(agent_id, agent)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Agent>)> {
        self.agents.iter().map(|(id, agent)| (id.as_str(), agent))
    }

    /// Registered agent ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.agents.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agents are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
