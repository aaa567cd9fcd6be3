//! Built-in canned-response agent.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;
use crate::models::{AgentSkill, Message, StreamEvent, Task, TaskResponse};

use super::{Agent, EventSender};

/// Simulated processing time before the streamed reply.
const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Agent that answers every task with a fixed text reply.
///
/// Serves as the default route target and as the reference
/// implementation for the [`Agent`] trait.
pub struct SimpleAgent {
    name: String,
    description: String,
    response_text: String,
    delay: Duration,
    skills: Vec<AgentSkill>,
}

impl SimpleAgent {
    /// Construct with the given identity and reply text.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        response_text: impl Into<String>,
    ) -> Self {
        let skill = AgentSkill::new(
            "simple_response",
            "Simple Response",
            "Provides a simple text response",
        )
        .with_tags(vec!["simple".into(), "text".into()])
        .with_examples(vec!["hello".into(), "hi".into(), "test".into()]);
        Self {
            name: name.into(),
            description: description.into(),
            response_text: response_text.into(),
            delay: DEFAULT_DELAY,
            skills: vec![skill],
        }
    }

    /// Override the simulated processing delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replace the advertised skills.
    #[must_use]
    pub fn with_skills(mut self, skills: Vec<AgentSkill>) -> Self {
        self.skills = skills;
        self
    }
}

impl Agent for SimpleAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn skills(&self) -> &[AgentSkill] {
        &self.skills
    }

    fn execute<'a>(
        &'a self,
        task: &'a Task,
    ) -> Pin<Box<dyn Future<Output = Result<TaskResponse>> + Send + 'a>> {
        Box::pin(async move {
            let result = Message::agent_text(&self.response_text);
            Ok(TaskResponse::completed(
                &task.id,
                result,
                task.context_id.clone(),
            ))
        })
    }

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

            tokio::time::sleep(self.delay).await;

            let result = Message::agent_text(&self.response_text);
            events
                .send(StreamEvent::message(&task.id, result, true))
                .await?;
            Ok(())
        })
    }
}
