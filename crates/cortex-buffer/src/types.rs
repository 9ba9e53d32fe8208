use chrono::{DateTime, Utc};
use cortex_core::{EventSource, Priority};
use serde::{Deserialize, Serialize};

/// Raw, pre-cognition input item awaiting interpretation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub source: EventSource,
    pub data: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(source: EventSource, data: impl Into<String>) -> Self {
        Self {
            source,
            data: data.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Processed, formatted observation or plan held in the Thought Buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thought {
    /// The raw content, without the `[PRIO]` tag.
    pub content: String,
    pub source: EventSource,
    pub original_ref: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub integrated: bool,
}

impl Thought {
    /// The canonical formatted string consumed by prompt constructors and
    /// the Response Decider's text scans: `[PRIO] content`.
    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.priority.tag(), self.content)
    }
}

/// An inbound chat-platform message awaiting engagement decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub index: u64,
    pub platform: String,
    pub username: String,
    pub message: String,
    pub has_bot_mention: bool,
    pub timestamp: DateTime<Utc>,
}

/// Derive the default priority for a freshly-ingested event source, before
/// any explicit override (§4.1).
pub fn default_priority_for_source(source: &EventSource) -> Priority {
    match source {
        EventSource::UserInput => Priority::High,
        EventSource::ChatDirectMention => Priority::Critical,
        EventSource::ChatQuestion => Priority::High,
        EventSource::VisionResult => Priority::Medium,
        EventSource::ToolFailed | EventSource::ToolTimeout => Priority::High,
        EventSource::ToolResult => Priority::Medium,
        EventSource::Internal => Priority::Low,
        EventSource::ChatMessage => Priority::Low,
    }
}

/// Refine chat-message urgency by scanning its text (§4.1): the agent's name
/// (case-insensitive) escalates to CRITICAL, a question mark to HIGH, an
/// exclamation mark to MEDIUM. The strongest signal found wins.
pub fn refine_chat_priority(message: &str, agent_name: &str) -> Priority {
    let upper = message.to_uppercase();
    if !agent_name.is_empty() && upper.contains(&agent_name.to_uppercase()) {
        return Priority::Critical;
    }
    if message.contains('?') {
        return Priority::High;
    }
    if message.contains('!') {
        return Priority::Medium;
    }
    Priority::Low
}
