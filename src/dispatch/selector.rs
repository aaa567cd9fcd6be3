//! Content-based agent selection.
//!
//! Each registered agent's skill examples form its trigger vocabulary.
//! An inbound message is tokenized the same way and routed to the first
//! registered agent whose vocabulary intersects the message tokens.
//! When nothing matches, selection falls back to the configured default
//! agent, so routing never fails a request on its own.

use std::collections::BTreeSet;

use crate::agents::AgentRegistry;
use crate::models::{AgentSkill, Message};

/// Minimum token length considered meaningful for matching.
const MIN_TOKEN_LEN: usize = 3;

/// Words too common to carry routing signal.
const STOPWORDS: &[&str] = &[
    "all", "and", "any", "are", "but", "can", "could", "does", "for", "from", "had", "has",
    "have", "how", "its", "not", "our", "that", "the", "this", "was", "were", "what", "will",
    "with", "you", "your",
];

/// Split text into lowercase alphanumeric tokens, dropping short tokens
/// and stopwords.
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN && !STOPWORDS.contains(token))
        .map(str::to_owned)
        .collect()
}

/// The trigger vocabulary of a set of skills: every token appearing in
/// any skill example.
#[must_use]
pub fn trigger_vocabulary(skills: &[AgentSkill]) -> BTreeSet<String> {
    skills
        .iter()
        .flat_map(|skill| skill.examples.iter())
        .flat_map(|example| tokenize(example))
        .collect()
}

/// Select the agent id for a message.
///
/// Agents are considered in registration order; the first whose trigger
/// vocabulary overlaps the message tokens wins. With no overlap anywhere
/// the configured default agent id is returned, whether or not an agent
/// is registered under it. Selection is a pure function of the message
/// text and the registry contents.
#[must_use]
pub fn select_agent(agents: &AgentRegistry, message: &Message, default_agent: &str) -> String {
    let tokens = tokenize(&message.text_content());
    if tokens.is_empty() {
        return default_agent.to_owned();
    }
    for (agent_id, agent) in agents.iter() {
        let vocabulary = trigger_vocabulary(agent.skills());
        if !vocabulary.is_disjoint(&tokens) {
            return agent_id.to_owned();
        }
    }
    default_agent.to_owned()
}
