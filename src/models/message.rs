//! Protocol message and part models.
//!
//! A message is an ordered, non-empty sequence of typed parts. Part kinds
//! are a closed tagged union so every consumption site matches
//! exhaustively instead of probing string-keyed payload fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{AppError, Result};

/// Author role of a protocol message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Message originated from the submitting client.
    User,
    /// Message produced by an agent.
    Agent,
    /// System-originated message (synthesized statuses, notices).
    System,
}

/// One typed content part of a message.
///
/// Exactly one payload shape exists per tag; decoding a part whose
/// required payload field is absent fails at the serde layer and surfaces
/// as an invalid-params error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Plain text content.
    Text {
        /// The text payload; must be non-empty.
        text: String,
    },
    /// Reference to an image resource.
    Image {
        /// Resolvable image location.
        image_url: String,
    },
    /// Reference to a file resource.
    File {
        /// Resolvable file location.
        file_url: String,
    },
    /// Structured JSON payload.
    Data {
        /// Arbitrary structured content.
        data: Value,
        /// MIME hint describing `data`.
        #[serde(default = "default_data_mime")]
        mime_type: String,
    },
}

fn default_data_mime() -> String {
    "application/json".into()
}

impl Part {
    /// Construct a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Validate the part-level payload invariants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidParams` if a text part is empty, a
    /// reference part has a blank location, or a data part lacks a MIME
    /// hint.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Text { text } => {
                if text.trim().is_empty() {
                    return Err(AppError::InvalidParams("text part must not be empty".into()));
                }
            }
            Self::Image { image_url } => {
                if image_url.trim().is_empty() {
                    return Err(AppError::InvalidParams(
                        "image part must carry a reference".into(),
                    ));
                }
            }
            Self::File { file_url } => {
                if file_url.trim().is_empty() {
                    return Err(AppError::InvalidParams(
                        "file part must carry a reference".into(),
                    ));
                }
            }
            Self::Data { mime_type, .. } => {
                if mime_type.trim().is_empty() {
                    return Err(AppError::InvalidParams(
                        "data part must carry a mime type hint".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Protocol message: a role plus an ordered sequence of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Ordered content parts; must be non-empty.
    pub parts: Vec<Part>,
    /// Unique message identifier.
    #[serde(rename = "messageId", default = "new_message_id")]
    pub message_id: String,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Construct a user message with a single text part.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Construct an agent message with a single text part.
    #[must_use]
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, vec![Part::text(text)])
    }

    /// Construct a message with a generated id and current timestamp.
    #[must_use]
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            message_id: new_message_id(),
            timestamp: Utc::now(),
        }
    }

    /// Validate the message-level invariants and each part.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidParams` if the part list is empty or any
    /// part fails its payload invariant.
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            return Err(AppError::InvalidParams(
                "message must contain at least one part".into(),
            ));
        }
        for part in &self.parts {
            part.validate()?;
        }
        Ok(())
    }

    /// Concatenated text content of all text parts, newline-joined.
    ///
    /// Non-text parts are skipped; routing and text-driven agents only
    /// look at textual content.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
