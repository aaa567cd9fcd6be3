//! Agent descriptor and discovery document models.

use serde::{Deserialize, Serialize};

/// Declared capability set of an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCapabilities {
    /// Supports incremental streaming output.
    pub streaming: bool,
    /// Supports push notifications.
    #[serde(rename = "pushNotifications")]
    pub push_notifications: bool,
    /// Exposes state transition history.
    #[serde(rename = "stateTransitionHistory")]
    pub state_transition_history: bool,
    /// Supports multi-turn conversations via context ids.
    #[serde(rename = "multiTurn")]
    pub multi_turn: bool,
    /// Accepts file uploads.
    #[serde(rename = "fileUpload")]
    pub file_upload: bool,
    /// Produces downloadable files.
    #[serde(rename = "fileDownload")]
    pub file_download: bool,
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            push_notifications: false,
            state_transition_history: true,
            multi_turn: true,
            file_upload: false,
            file_download: false,
        }
    }
}

impl AgentCapabilities {
    /// Fold another capability set into this one (logical OR per flag).
    pub fn merge_from(&mut self, other: &Self) {
        self.streaming |= other.streaming;
        self.push_notifications |= other.push_notifications;
        self.state_transition_history |= other.state_transition_history;
        self.multi_turn |= other.multi_turn;
        self.file_upload |= other.file_upload;
        self.file_download |= other.file_download;
    }
}

/// One declared skill of an agent.
///
/// `examples` doubles as the trigger vocabulary for content-based
/// routing: messages whose text overlaps a skill's example keywords are
/// dispatched to the owning agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSkill {
    /// Stable skill identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the skill does.
    pub description: String,
    /// Classification tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Example invocations; also the routing trigger vocabulary.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Accepted input content types.
    #[serde(rename = "inputModes", default = "default_modes")]
    pub input_modes: Vec<String>,
    /// Produced output content types.
    #[serde(rename = "outputModes", default = "default_modes")]
    pub output_modes: Vec<String>,
}

fn default_modes() -> Vec<String> {
    vec!["text/plain".into()]
}

impl AgentSkill {
    /// Construct a skill with default modes and no tags or examples.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            examples: Vec::new(),
            input_modes: default_modes(),
            output_modes: default_modes(),
        }
    }

    /// Attach example invocations (the routing trigger vocabulary).
    #[must_use]
    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }

    /// Attach classification tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Authentication requirements advertised in the discovery document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentAuthentication {
    /// Supported schemes.
    pub schemes: Vec<String>,
    /// Whether requests must authenticate.
    pub required: bool,
}

impl Default for AgentAuthentication {
    fn default() -> Self {
        Self {
            schemes: vec!["bearer".into()],
            required: false,
        }
    }
}

/// Discovery document aggregated from every registered agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// Server display name.
    pub name: String,
    /// Server description.
    pub description: String,
    /// Server version.
    pub version: String,
    /// Base URL clients should target.
    pub url: String,
    /// Aggregated capability set.
    pub capabilities: AgentCapabilities,
    /// Authentication requirements.
    pub authentication: AgentAuthentication,
    /// Aggregated skills from all registered agents.
    pub skills: Vec<AgentSkill>,
    /// Default accepted content types.
    #[serde(rename = "defaultInputModes")]
    pub default_input_modes: Vec<String>,
    /// Default produced content types.
    #[serde(rename = "defaultOutputModes")]
    pub default_output_modes: Vec<String>,
    /// Whether an extended card is available to authenticated callers.
    #[serde(rename = "supportsAuthenticatedExtendedCard", default)]
    pub supports_authenticated_extended_card: bool,
}
