//! Domain model module declarations.

pub mod card;
pub mod event;
pub mod message;
pub mod task;

pub use card::{AgentAuthentication, AgentCapabilities, AgentCard, AgentSkill};
pub use event::StreamEvent;
pub use message::{Message, Part, Role};
pub use task::{MessageSendParams, Task, TaskResponse, TaskState, TaskStatus};
