//! Streaming pipeline for `message/stream`.
//!
//! The agent runs as a spawned producer writing [`StreamEvent`]s into a
//! bounded channel; the SSE stream is the consumer. The pipeline
//! guarantees the wire sees at most one final frame per task, that it is
//! the last frame, and that the registry reflects the outcome before the
//! final frame is yielded. When the producer errors, panics, or ends
//! without a final event, the pipeline synthesizes exactly one terminal
//! failure frame. Dropping the stream (client disconnect) cancels the
//! producer cooperatively and records the task as cancelled.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agents::{event_channel, Agent};
use crate::dispatch::finalize_continuation;
use crate::errors::AppError;
use crate::models::{StreamEvent, Task, TaskState};
use crate::registry::TaskRegistry;
use crate::rpc::JsonRpcResponse;

/// Capacity of the producer/consumer event channel.
///
/// Bounded so a producer that outruns a slow client parks instead of
/// buffering without limit.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Cleanup handle armed for the lifetime of one stream.
///
/// Dropping the stream before the terminal frame was delivered means
/// the client went away: cancel the producer and record the task (and a
/// re-entered continuation prior) as cancelled. The retention sweep
/// evicts the entries later.
struct StreamGuard {
    tasks: Arc<TaskRegistry>,
    task_id: String,
    continuation_of: Option<String>,
    cancel: CancellationToken,
    done: bool,
}

impl StreamGuard {
    fn disarm(&mut self) {
        self.done = true;
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.cancel.cancel();
        match self
            .tasks
            .transition_if(&self.task_id, TaskState::Working, TaskState::Cancelled)
        {
            Ok(true) => {
                info!(task_id = %self.task_id, "stream disconnected, task cancelled");
            }
            Ok(false) => {}
            Err(err) => {
                warn!(task_id = %self.task_id, %err, "failed to record cancellation");
            }
        }
        if let Some(prior_id) = &self.continuation_of {
            if let Err(err) =
                self.tasks
                    .transition_if(prior_id, TaskState::Working, TaskState::Cancelled)
            {
                warn!(prior_id = %prior_id, %err, "failed to cancel continuation prior");
            }
        }
    }
}

/// Encode one stream event as an SSE frame carrying a response envelope.
fn frame(request_id: &Value, event: &StreamEvent) -> Option<Event> {
    let payload = match serde_json::to_value(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(task_id = event.task_id(), %err, "failed to encode stream event");
            return None;
        }
    };
    let envelope = JsonRpcResponse::result(request_id.clone(), payload);
    match Event::default().json_data(&envelope) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(task_id = event.task_id(), %err, "failed to build sse frame");
            None
        }
    }
}

/// Drive one registered task as an SSE stream.
///
/// The task must be in pending state (as left by
/// [`prepare_task`](crate::dispatch::prepare_task)). Each yielded frame
/// is a JSON-RPC response envelope whose result is one stream event;
/// the stream ends after the single terminal frame.
pub fn stream_task(
    tasks: Arc<TaskRegistry>,
    agent: Arc<dyn Agent>,
    task: Task,
    request_id: Value,
    deadline: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        if let Err(err) = tasks.transition(&task.id, TaskState::Working) {
            warn!(task_id = %task.id, %err, "failed to start streaming task");
            tasks.remove(&task.id);
            yield Ok(error_frame(&request_id, &err));
            return;
        }

        let cancel = CancellationToken::new();
        let (sender, mut rx) = event_channel(EVENT_CHANNEL_CAPACITY, cancel.clone());

        let mut guard = StreamGuard {
            tasks: Arc::clone(&tasks),
            task_id: task.id.clone(),
            continuation_of: task.continuation_of.clone(),
            cancel: cancel.clone(),
            done: false,
        };

        let producer_agent = Arc::clone(&agent);
        let producer_task = task.clone();
        let mut producer = tokio::spawn(async move {
            producer_agent
                .execute_streaming(&producer_task, sender)
                .await
        });

        let timeout_at = tokio::time::Instant::now() + deadline;

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(event) if event.is_final() => {
                            let final_state = event.implied_state();
                            settle(&tasks, &task, final_state);
                            if let Some(sse) = frame(&request_id, &event) {
                                yield Ok(sse);
                            }
                            guard.disarm();
                            if final_state.is_terminal() {
                                tasks.remove(&task.id);
                            }
                            info!(task_id = %task.id, state = %final_state, "stream finished");
                            break;
                        }
                        Some(event) => {
                            match frame(&request_id, &event) {
                                Some(sse) => yield Ok(sse),
                                None => continue,
                            }
                        }
                        None => {
                            // Producer is gone without a final frame.
                            let reason = match (&mut producer).await {
                                Ok(Ok(())) => "agent ended stream without a final event".to_owned(),
                                Ok(Err(err)) => err.to_string(),
                                Err(_) => "agent execution panicked".to_owned(),
                            };
                            let event = StreamEvent::failed(&task.id, reason);
                            settle(&tasks, &task, TaskState::Failed);
                            if let Some(sse) = frame(&request_id, &event) {
                                yield Ok(sse);
                            }
                            guard.disarm();
                            tasks.remove(&task.id);
                            break;
                        }
                    }
                }
                () = tokio::time::sleep_until(timeout_at) => {
                    cancel.cancel();
                    let event = StreamEvent::failed(
                        &task.id,
                        format!("agent execution exceeded {} seconds", deadline.as_secs()),
                    );
                    settle(&tasks, &task, TaskState::Failed);
                    if let Some(sse) = frame(&request_id, &event) {
                        yield Ok(sse);
                    }
                    guard.disarm();
                    tasks.remove(&task.id);
                    warn!(task_id = %task.id, "streaming task timed out");
                    break;
                }
            }
        }
    }
}

/// Record the stream outcome in the registry before the final frame is
/// yielded: the task moves to its final state and a continuation prior
/// follows it. Entry removal happens after delivery.
fn settle(tasks: &Arc<TaskRegistry>, task: &Task, final_state: TaskState) {
    match tasks.transition_if(&task.id, TaskState::Working, final_state) {
        Ok(true) => {}
        Ok(false) => {
            warn!(task_id = %task.id, state = %final_state, "task already settled by another writer");
        }
        Err(err) => {
            warn!(task_id = %task.id, %err, "failed to settle streaming task");
        }
    }
    finalize_continuation(tasks, task, final_state);
}

/// Encode a failure as a response-envelope SSE frame.
fn error_frame(request_id: &Value, err: &AppError) -> Event {
    let envelope = JsonRpcResponse::from_app_error(request_id.clone(), err);
    Event::default()
        .json_data(&envelope)
        .unwrap_or_else(|_| Event::default().data("{\"jsonrpc\":\"2.0\"}"))
}
