//! Inbound content safety screening.
//!
//! Text parts are checked against a small set of injection patterns and a
//! length ceiling before any task state is created. Screening is
//! intentionally shallow; it guards the protocol surface, not the agents.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Message, Part};
use crate::{AppError, Result};

/// Maximum accepted length of a single text part, in characters.
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Injection patterns rejected outright. Case-insensitive.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    r"(?i)<script[^>]*>",
    r"(?i)javascript:",
    r"(?i)vbscript:",
    r"(?i)data:text/html",
    r"(?i)on(?:load|error|click|mouseover)\s*=",
];

static SUSPICIOUS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SUSPICIOUS_PATTERNS
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Screen every text part of a message.
///
/// # Errors
///
/// Returns `AppError::InvalidParams` when a text part exceeds
/// [`MAX_TEXT_LENGTH`] or matches a suspicious pattern.
pub fn screen_message(message: &Message) -> Result<()> {
    for part in &message.parts {
        if let Part::Text { text } = part {
            screen_text(text)?;
        }
    }
    Ok(())
}

fn screen_text(text: &str) -> Result<()> {
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(AppError::InvalidParams(format!(
            "text part exceeds maximum length of {MAX_TEXT_LENGTH} characters"
        )));
    }
    if SUSPICIOUS.iter().any(|pattern| pattern.is_match(text)) {
        return Err(AppError::InvalidParams(
            "message content failed safety screening".into(),
        ));
    }
    Ok(())
}
