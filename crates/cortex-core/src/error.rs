use thiserror::Error;

/// Every error kind the cognitive core can surface, per the error handling
/// design: most are non-fatal and are recovered by injecting a thought back
/// into the buffer rather than propagating to the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("embedding endpoint unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("language model endpoint unavailable: {0}")]
    LanguageModelUnavailable(String),

    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("tool disabled: {tool}")]
    ToolDisabled { tool: String },

    #[error("tool unavailable: {tool}")]
    ToolUnavailable { tool: String },

    #[error("tool '{tool}' timed out after {timeout_secs}s")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("tool '{tool}' execution failed: {reason}")]
    ToolError { tool: String, reason: String },

    #[error("instructions not retrieved for tool: {tool}")]
    InstructionsNotRetrieved { tool: String },

    #[error("malformed language model output: {0}")]
    MalformedOutput(String),

    #[error("memory I/O failure at {path}: {reason}")]
    MemoryIoFailure { path: String, reason: String },

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Short machine-readable slug for structured logging and for
    /// `get_performance_stats()` style control-surface responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::EmbeddingUnavailable(_) => "embedding_unavailable",
            CoreError::LanguageModelUnavailable(_) => "language_model_unavailable",
            CoreError::ToolNotFound { .. } => "tool_not_found",
            CoreError::ToolDisabled { .. } => "tool_disabled",
            CoreError::ToolUnavailable { .. } => "tool_unavailable",
            CoreError::ToolTimeout { .. } => "tool_timeout",
            CoreError::ToolError { .. } => "tool_error",
            CoreError::InstructionsNotRetrieved { .. } => "instructions_not_retrieved",
            CoreError::MalformedOutput(_) => "malformed_output",
            CoreError::MemoryIoFailure { .. } => "memory_io_failure",
            CoreError::ShutdownRequested => "shutdown_requested",
            CoreError::Config(_) => "config_error",
            CoreError::Serialization(_) => "serialization_error",
            CoreError::Io(_) => "io_error",
        }
    }

    /// Whether this error kind should abort the surrounding tick/action
    /// rather than merely being logged. Per the error handling design, only
    /// shutdown is terminal — everything else is recovered in place.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::ShutdownRequested)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
