use serde::{Deserialize, Serialize};
use std::fmt;

/// Urgency of a processed thought. Embedded as a `[TAG]` prefix in the
/// thought's formatted text and kept as a structured field for fast queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn tag(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            "CRITICAL" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Origin of a raw event or processed thought.
///
/// Drives default priority derivation (see `Priority::from_source`-style
/// logic in `cortex-buffer`) and which prompt section a thought belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    UserInput,
    ChatMessage,
    ChatDirectMention,
    ChatQuestion,
    VisionResult,
    ToolResult,
    ToolFailed,
    ToolTimeout,
    Internal,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::UserInput => "user_input",
            EventSource::ChatMessage => "chat_message",
            EventSource::ChatDirectMention => "chat_direct_mention",
            EventSource::ChatQuestion => "chat_question",
            EventSource::VisionResult => "vision_result",
            EventSource::ToolResult => "tool_result",
            EventSource::ToolFailed => "tool_failed",
            EventSource::ToolTimeout => "tool_timeout",
            EventSource::Internal => "internal",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four cognitive modes selected by the Response Decider per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Responsive,
    Planning,
    Reflective,
    Spoken,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Responsive => "responsive",
            Mode::Planning => "planning",
            Mode::Reflective => "reflective",
            Mode::Spoken => "spoken",
        };
        f.write_str(s)
    }
}

/// Unique identifier for an in-flight tool action: `a<counter>_<ms-timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(counter: u64, millis: i64) -> Self {
        Self(format!("a{counter}_{millis}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a tool's boolean runtime control, e.g. `USE_WEATHER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlVariable(pub String);

impl ControlVariable {
    pub fn for_tool(tool_name: &str) -> Self {
        Self(format!("USE_{}", tool_name.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
