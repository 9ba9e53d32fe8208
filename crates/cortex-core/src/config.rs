use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// TTL of an instruction-persistence grant, in seconds (§4.5).
pub const INSTRUCTION_TTL_SECS: u64 = 360;
/// Default thought buffer capacity N (§3).
pub const DEFAULT_BUFFER_CAPACITY: usize = 25;
/// Mode-selection threshold: below this, PLANNING degrades to REFLECTIVE is
/// not used directly, but idle-past-this triggers REFLECTIVE (§4.7 rule 6).
pub const DEFAULT_PLANNING_WINDOW_SECS: i64 = 360;
/// Startup thought-count threshold forcing the enriched REFLECTIVE prompt (§4.7).
pub const STARTUP_THOUGHT_THRESHOLD: usize = 3;
/// Max chat messages converted to events per tick (§4.8 step 2).
pub const DEFAULT_CHAT_BATCH_SIZE: usize = 10;

/// Top-level config (`cortex.toml` + `CORTEX_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    pub agent_name: String,
    /// Literal substring that, if present in incoming text, triggers
    /// immediate shutdown before any processing (§6).
    pub kill_command: String,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub loop_config: LoopConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Default for CortexConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            kill_command: default_kill_command(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            buffer: BufferConfig::default(),
            loop_config: LoopConfig::default(),
            memory: MemoryConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub endpoint_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_num_predict")]
    pub num_predict: i32,
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    pub seed: Option<i64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_llm_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repeat_penalty: default_repeat_penalty(),
            num_predict: default_num_predict(),
            keep_alive: default_keep_alive(),
            num_ctx: default_num_ctx(),
            seed: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub endpoint_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_embedding_url(),
            model: default_embedding_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
        }
    }
}

/// Pacing knobs for the Cognitive Loop (§4.8, §9 open questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    #[serde(default = "default_min_proactive_interval")]
    pub min_proactive_interval_secs: u64,
    #[serde(default = "default_max_proactive_interval")]
    pub max_proactive_interval_secs: u64,
    #[serde(default = "default_chat_batch_interval")]
    pub chat_batch_interval_secs: u64,
    #[serde(default = "default_chat_batch_size")]
    pub chat_batch_size: usize,
    #[serde(default = "default_reminder_poll_interval")]
    pub reminder_poll_interval_secs: u64,
    #[serde(default = "default_memory_integration_interval")]
    pub memory_integration_interval_secs: u64,
    #[serde(default = "default_planning_window")]
    pub planning_window_secs: i64,
    #[serde(default = "default_startup_threshold")]
    pub startup_thought_threshold: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_proactive_interval_secs: default_min_proactive_interval(),
            max_proactive_interval_secs: default_max_proactive_interval(),
            chat_batch_interval_secs: default_chat_batch_interval(),
            chat_batch_size: default_chat_batch_size(),
            reminder_poll_interval_secs: default_reminder_poll_interval(),
            memory_integration_interval_secs: default_memory_integration_interval(),
            planning_window_secs: default_planning_window(),
            startup_thought_threshold: default_startup_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_base_memory_dir")]
    pub base_memory_dir: String,
    #[serde(default = "default_short_capacity")]
    pub short_capacity: usize,
    #[serde(default = "default_user_weight")]
    pub combined_user_weight: f32,
    #[serde(default = "default_thought_weight")]
    pub combined_thought_weight: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            base_memory_dir: default_base_memory_dir(),
            short_capacity: default_short_capacity(),
            combined_user_weight: default_user_weight(),
            combined_thought_weight: default_thought_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_tools_dir")]
    pub manifest_dir: String,
    #[serde(default = "default_tool_timeout")]
    pub default_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            manifest_dir: default_tools_dir(),
            default_timeout_secs: default_tool_timeout(),
        }
    }
}

fn default_agent_name() -> String {
    "Cortex".to_string()
}
fn default_kill_command() -> String {
    "!!shutdown!!".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}
fn default_llm_model() -> String {
    "llama3".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_top_k() -> u32 {
    40
}
fn default_repeat_penalty() -> f32 {
    1.1
}
fn default_num_predict() -> i32 {
    512
}
fn default_keep_alive() -> String {
    "5m".to_string()
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_embedding_url() -> String {
    "http://localhost:11434/api/embeddings".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}
fn default_min_proactive_interval() -> u64 {
    5
}
fn default_max_proactive_interval() -> u64 {
    30
}
fn default_chat_batch_interval() -> u64 {
    2
}
fn default_chat_batch_size() -> usize {
    DEFAULT_CHAT_BATCH_SIZE
}
fn default_reminder_poll_interval() -> u64 {
    30
}
fn default_memory_integration_interval() -> u64 {
    120
}
fn default_planning_window() -> i64 {
    DEFAULT_PLANNING_WINDOW_SECS
}
fn default_startup_threshold() -> usize {
    STARTUP_THOUGHT_THRESHOLD
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cortex/memory", home)
}
fn default_base_memory_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cortex/base_memory", home)
}
fn default_short_capacity() -> usize {
    25
}
fn default_user_weight() -> f32 {
    0.6
}
fn default_thought_weight() -> f32 {
    0.4
}
fn default_tools_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cortex/tools", home)
}
fn default_tool_timeout() -> u64 {
    30
}

impl CortexConfig {
    /// Load config from a TOML file with `CORTEX_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `~/.cortex/cortex.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CortexConfig = Figment::from(figment::providers::Serialized::defaults(
            CortexConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CORTEX_").split("__"))
        .extract()
        .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cortex/cortex.toml", home)
}
