use chrono::{DateTime, Utc};
use cortex_core::ActionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// State of an in-flight (or completed) tool invocation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionState {
    pub action_id: ActionId,
    pub tool_name: String,
    pub args: Vec<serde_json::Value>,
    pub status: ActionStatus,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub failure_reason: Option<String>,
    pub acknowledged: bool,
    pub result_integrated: bool,
    pub attempt_number: u32,
    pub query_simplified: bool,
}
