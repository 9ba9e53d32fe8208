use async_trait::async_trait;
use serde_json::Value;

/// Result of a single tool command invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: message.into(), is_error: true }
    }
}

/// A pluggable capability the Tool Execution Engine may dispatch to (§6).
///
/// `start`/`end` bracket the tool's lifecycle as it's enabled/disabled via its
/// control variable; `is_available` is polled before every dispatch so a tool
/// can report transient outages (auth expired, backend unreachable) without
/// being removed from the registry.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) {}
    async fn end(&self) {}

    async fn is_available(&self) -> bool {
        true
    }

    async fn execute(&self, command: &str, args: Vec<Value>) -> ToolOutcome;
}
