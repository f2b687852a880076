//! Core types for the ambience agent system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Author role of a conversation message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool
}

/// Identity of every participant the supervisor can hand off to.
///
/// The string form is the name the agent signs its messages with and is
/// what downstream consumers use to attribute content.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentName {
    Supervisor,
    GlobalContextAgent,
    LocalContextAgent,
    MemoryAgent,
    ReinforcementAgent,
    MusicGenerationAgent
}

impl AgentName {
    /// Human-readable capability description used in handoff records.
    pub fn capability(&self) -> &'static str {
        match self {
            AgentName::Supervisor => "Coordinates the specialist agents",
            AgentName::GlobalContextAgent => {
                "An agent that can get the emotional context of a location"
            }
            AgentName::LocalContextAgent => {
                "An agent that can analyze images to understand the user's local environment"
            }
            AgentName::MemoryAgent => "An agent that can store and retrieve information",
            AgentName::ReinforcementAgent => {
                "An agent that learns from feedback and improves recommendations"
            }
            AgentName::MusicGenerationAgent => "An agent that can generate music"
        }
    }
}

/// A single tool invocation requested by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments
        }
    }
}

/// One entry of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, None, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, Some("user".to_string()), content)
    }

    /// An assistant message signed by `name`.
    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, Some(name.into()), content)
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool: impl Into<String>,
        content: impl Into<String>
    ) -> Self {
        Self {
            role: Role::Tool,
            name: Some(tool.into()),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into())
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn author(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn plain(role: Role, name: Option<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            name,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None
        }
    }
}

/// Tool schema advertised to a language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value
}

/// Outcome of a tool invocation as recorded in an agent's trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Failed,
    /// Refused by a budget guard; never reached the backend.
    Rejected
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool: String,
    pub arguments: Value,
    pub output: String,
    pub status: ToolStatus
}

/// Input of one `LanguageModel::complete` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Name of the agent issuing the request.
    pub agent: String,
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32
}

/// A metadata value is either text or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Number(f64)
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            MetadataValue::Number(_) => None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            MetadataValue::Text(s) => s.parse().ok()
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// An immutable entry of the semantic memory store.
///
/// The embedding is owned by the store and never exposed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>
}

impl MemoryRecord {
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_str)
    }

    /// The `type` tag (`music_generation`, `user_preference`, ...).
    pub fn record_type(&self) -> Option<&str> {
        self.meta_str("type")
    }
}

/// A search hit with its non-negative distance (0 = identical).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub distance: f32
}

impl ScoredRecord {
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Parameters for one generated audio layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub prompt: String,
    pub duration_secs: u32,
    pub has_beat: bool
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRequest {
    pub image_ref: String,
    pub prompt: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String
}
