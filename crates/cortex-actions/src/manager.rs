use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use cortex_core::ActionId;
use tracing::warn;

use crate::types::{ActionState, ActionStatus};

/// Per-tool attempt-tracking cap before pruning to the 50 most recent (§4.2,
/// carried through from the tool's per-tool attempt tracking detail).
const MAX_ATTEMPT_ENTRIES_PER_TOOL: usize = 100;
const PRUNE_TO_ATTEMPT_ENTRIES: usize = 50;
/// How many calls each tool's history keeps for the throttle rule.
const CALL_HISTORY_LEN: usize = 3;

struct Inner {
    actions: HashMap<ActionId, ActionState>,
    action_counter: u64,
    /// tool_name -> (query sub-key -> attempt count), keyed by
    /// `hash(tool ":" args[0][:50])` per §3; here the truncated first-arg is
    /// used directly as the sub-key instead of a literal hash, since String
    /// equality over the truncated text is equivalent and avoids a hashing
    /// dependency. Nested per tool so the 100/50 prune threshold applies to
    /// each tool's own history independently rather than to the whole map.
    attempt_counts: HashMap<String, HashMap<String, u32>>,
    last_query: HashMap<String, String>,
    /// tool_name -> recent call outcomes, newest last.
    call_history: HashMap<String, Vec<(DateTime<Utc>, ActionStatus)>>,
}

/// Tracks async tool executions with attempt counting and throttling (C2).
pub struct ActionStateManager {
    inner: Mutex<Inner>,
}

impl ActionStateManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                actions: HashMap::new(),
                action_counter: 0,
                attempt_counts: HashMap::new(),
                last_query: HashMap::new(),
                call_history: HashMap::new(),
            }),
        }
    }

    fn attempt_key(args: &[serde_json::Value]) -> String {
        let first = args
            .first()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        first.chars().take(50).collect()
    }

    pub fn register_action(
        &self,
        tool_name: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> ActionId {
        let tool_name = tool_name.into();
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        inner.action_counter += 1;
        let now = Utc::now();
        let action_id = ActionId::new(inner.action_counter, now.timestamp_millis());

        let key = Self::attempt_key(&args);
        let attempt_number = {
            let per_tool = inner.attempt_counts.entry(tool_name.clone()).or_default();
            let counter = per_tool.entry(key).or_insert(0);
            *counter += 1;
            *counter
        };

        let current_query = args
            .first()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        let mut query_simplified = false;
        if !current_query.is_empty() {
            if let Some(prev) = inner.last_query.get(&tool_name) {
                if !prev.is_empty()
                    && current_query.split_whitespace().count() < prev.split_whitespace().count()
                {
                    query_simplified = true;
                }
            }
            inner.last_query.insert(tool_name.clone(), current_query);
        }

        inner.actions.insert(
            action_id.clone(),
            ActionState {
                action_id: action_id.clone(),
                tool_name: tool_name.clone(),
                args,
                status: ActionStatus::Pending,
                initiated_at: now,
                completed_at: None,
                result: None,
                error: None,
                failure_reason: None,
                acknowledged: false,
                result_integrated: false,
                attempt_number,
                query_simplified,
            },
        );

        Self::push_history(&mut inner, &tool_name, now, ActionStatus::Pending);
        Self::prune_attempt_counts_locked(&mut inner, &tool_name);
        action_id
    }

    fn push_history(inner: &mut Inner, tool_name: &str, at: DateTime<Utc>, status: ActionStatus) {
        let history = inner.call_history.entry(tool_name.to_string()).or_default();
        history.push((at, status));
        if history.len() > CALL_HISTORY_LEN {
            history.remove(0);
        }
    }

    pub fn mark_in_progress(&self, id: &ActionId) {
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        if let Some(action) = inner.actions.get_mut(id) {
            action.status = ActionStatus::InProgress;
        }
    }

    pub fn complete_action(&self, id: &ActionId, result: serde_json::Value) {
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        let tool_name = inner.actions.get(id).map(|a| a.tool_name.clone());
        if let Some(action) = inner.actions.get_mut(id) {
            action.status = ActionStatus::Completed;
            action.completed_at = Some(Utc::now());
            action.result = Some(result);
        }
        if let Some(tool_name) = tool_name {
            let now = Utc::now();
            Self::push_history(&mut inner, &tool_name, now, ActionStatus::Completed);
        }
    }

    pub fn fail_action(&self, id: &ActionId, error: impl Into<String>, reason: Option<String>) {
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        let tool_name = inner.actions.get(id).map(|a| a.tool_name.clone());
        if let Some(action) = inner.actions.get_mut(id) {
            action.status = ActionStatus::Failed;
            action.completed_at = Some(Utc::now());
            action.error = Some(error.into());
            action.failure_reason = reason;
        }
        if let Some(tool_name) = tool_name {
            let now = Utc::now();
            Self::push_history(&mut inner, &tool_name, now, ActionStatus::Failed);
        }
    }

    pub fn mark_timeout(&self, id: &ActionId) {
        self.fail_action(id, "timed out", Some("timeout".to_string()));
    }

    pub fn get_pending_actions(&self) -> Vec<ActionState> {
        let inner = self.inner.lock().expect("action state mutex poisoned");
        inner
            .actions
            .values()
            .filter(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::InProgress))
            .cloned()
            .collect()
    }

    pub fn get_recent_tool_result(&self, tool: &str, max_age: Duration) -> Option<ActionState> {
        let inner = self.inner.lock().expect("action state mutex poisoned");
        let cutoff = Utc::now() - max_age;
        inner
            .actions
            .values()
            .filter(|a| a.tool_name == tool && a.status == ActionStatus::Completed)
            .filter(|a| a.completed_at.map(|t| t >= cutoff).unwrap_or(false))
            .max_by_key(|a| a.completed_at)
            .cloned()
    }

    pub fn is_tool_currently_executing(&self, tool: &str) -> bool {
        let inner = self.inner.lock().expect("action state mutex poisoned");
        inner.actions.values().any(|a| {
            a.tool_name == tool && matches!(a.status, ActionStatus::Pending | ActionStatus::InProgress)
        })
    }

    /// Throttle when: called within `min_interval_seconds`; ≥2 failures in
    /// the last 3 attempts AND the last call was <30s ago; or any action for
    /// this tool is still pending (§4.2).
    pub fn should_throttle_tool(&self, tool: &str, min_interval_seconds: i64) -> (bool, Option<String>) {
        let inner = self.inner.lock().expect("action state mutex poisoned");

        if inner.actions.values().any(|a| {
            a.tool_name == tool && matches!(a.status, ActionStatus::Pending | ActionStatus::InProgress)
        }) {
            return (true, Some("an action for this tool is already pending".to_string()));
        }

        let history = inner.call_history.get(tool);
        if let Some(history) = history {
            if let Some((last_at, _)) = history.last() {
                let since_last = (Utc::now() - *last_at).num_seconds();
                if since_last < min_interval_seconds {
                    return (
                        true,
                        Some(format!("called again within {min_interval_seconds}s")),
                    );
                }
                let failures = history.iter().filter(|(_, s)| *s == ActionStatus::Failed).count();
                if failures >= 2 && since_last < 30 {
                    return (
                        true,
                        Some("repeated recent failures for this tool".to_string()),
                    );
                }
            }
        }

        (false, None)
    }

    pub fn get_tool_awareness_context(&self) -> String {
        let pending = self.get_pending_actions();
        if pending.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Currently Running Tools\n");
        for action in pending {
            out.push_str(&format!(
                "- {} ({}) started {}\n",
                action.tool_name, action.action_id, action.initiated_at
            ));
        }
        out
    }

    pub fn get_recent_failures_summary(&self) -> String {
        let inner = self.inner.lock().expect("action state mutex poisoned");
        let mut failures: Vec<&ActionState> = inner
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::Failed)
            .collect();
        failures.sort_by_key(|a| a.completed_at);
        if failures.is_empty() {
            return String::new();
        }
        let mut out = String::from("## Recent Tool Failures\n");
        for action in failures.iter().rev().take(5) {
            out.push_str(&format!(
                "- {}: {} ({})\n",
                action.tool_name,
                action.error.as_deref().unwrap_or("unknown error"),
                action.failure_reason.as_deref().unwrap_or("error")
            ));
        }
        out
    }

    pub fn get_tools_health_summary(&self) -> String {
        let inner = self.inner.lock().expect("action state mutex poisoned");
        let mut out = String::from("## Tool Health\n");
        for (tool, history) in inner.call_history.iter() {
            let failures = history.iter().filter(|(_, s)| *s == ActionStatus::Failed).count();
            out.push_str(&format!("- {tool}: {failures}/{} recent failures\n", history.len()));
        }
        out
    }

    /// Purge completed/failed actions older than `max_age`; prune every
    /// tool's attempt-tracking map that exceeds 100 entries down to its own
    /// 50 most recent, independently of every other tool's map (§4.2).
    pub fn cleanup_old_actions(&self, max_age: Duration) -> usize {
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        let cutoff = Utc::now() - max_age;
        let before = inner.actions.len();
        inner.actions.retain(|_, a| match a.status {
            ActionStatus::Completed | ActionStatus::Failed | ActionStatus::Cancelled => {
                a.completed_at.map(|t| t >= cutoff).unwrap_or(true)
            }
            _ => true,
        });
        let tools: Vec<String> = inner.attempt_counts.keys().cloned().collect();
        for tool in &tools {
            Self::prune_attempt_counts_locked(&mut inner, tool);
        }
        before - inner.actions.len()
    }

    fn prune_attempt_counts_locked(inner: &mut Inner, tool_name: &str) {
        let Some(per_tool) = inner.attempt_counts.get_mut(tool_name) else {
            return;
        };
        if per_tool.len() <= MAX_ATTEMPT_ENTRIES_PER_TOOL {
            return;
        }
        warn!(
            tool = tool_name,
            entries = per_tool.len(),
            "pruning per-tool attempt-tracking map"
        );
        let mut entries: Vec<(String, u32)> = per_tool.drain().collect();
        entries.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
        entries.truncate(PRUNE_TO_ATTEMPT_ENTRIES);
        *per_tool = entries.into_iter().collect();
    }

    #[cfg(test)]
    pub fn record_call_at(&self, tool: &str, at: DateTime<Utc>, status: ActionStatus) {
        let mut inner = self.inner.lock().expect("action state mutex poisoned");
        Self::push_history(&mut inner, tool, at, status);
    }
}

impl Default for ActionStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attempt_numbers_increment_per_key() {
        let mgr = ActionStateManager::new();
        let id1 = mgr.register_action("search", vec![json!("weather today")]);
        let id2 = mgr.register_action("search", vec![json!("weather today")]);
        let inner = mgr.inner.lock().unwrap();
        assert_eq!(inner.actions[&id1].attempt_number, 1);
        assert_eq!(inner.actions[&id2].attempt_number, 2);
    }

    #[test]
    fn query_simplified_detected_on_shorter_retry() {
        let mgr = ActionStateManager::new();
        mgr.register_action("search", vec![json!("what is the weather today in paris")]);
        let id2 = mgr.register_action("search", vec![json!("weather today in paris")]);
        // different first-arg text => different attempt key => attempt_number resets to 1,
        // but the tool-level last-query comparison still detects the simplification.
        let inner = mgr.inner.lock().unwrap();
        assert_eq!(inner.actions[&id2].attempt_number, 1);
        assert!(inner.actions[&id2].query_simplified);
    }

    #[test]
    fn throttle_on_repeated_failures_within_window() {
        let mgr = ActionStateManager::new();
        let now = Utc::now();
        mgr.record_call_at("search", now - Duration::seconds(20), ActionStatus::Failed);
        mgr.record_call_at("search", now - Duration::seconds(15), ActionStatus::Failed);
        mgr.record_call_at("search", now - Duration::seconds(10), ActionStatus::Failed);
        let (throttled, _) = mgr.should_throttle_tool("search", 5);
        assert!(throttled);
    }

    #[test]
    fn no_throttle_once_outside_window() {
        let mgr = ActionStateManager::new();
        let now = Utc::now();
        mgr.record_call_at("search", now - Duration::seconds(50), ActionStatus::Failed);
        mgr.record_call_at("search", now - Duration::seconds(40), ActionStatus::Failed);
        mgr.record_call_at("search", now - Duration::seconds(35), ActionStatus::Failed);
        let (throttled, _) = mgr.should_throttle_tool("search", 5);
        assert!(!throttled);
    }

    #[test]
    fn pending_action_blocks_throttle_independent_of_history() {
        let mgr = ActionStateManager::new();
        mgr.register_action("search", vec![json!("weather")]);
        let (throttled, reason) = mgr.should_throttle_tool("search", 1);
        assert!(throttled);
        assert!(reason.unwrap().contains("pending"));
    }

    #[test]
    fn attempt_pruning_is_independent_per_tool() {
        let mgr = ActionStateManager::new();
        for i in 0..60 {
            mgr.register_action("search", vec![json!(format!("query {i}"))]);
        }
        for i in 0..60 {
            mgr.register_action("browse", vec![json!(format!("page {i}"))]);
        }
        let inner = mgr.inner.lock().unwrap();
        // 120 entries combined, but neither tool individually crossed the
        // 100-entry cap, so neither tool's history should have been pruned.
        assert_eq!(inner.attempt_counts["search"].len(), 60);
        assert_eq!(inner.attempt_counts["browse"].len(), 60);
    }

    #[test]
    fn attempt_pruning_triggers_per_tool_once_its_own_cap_is_crossed() {
        let mgr = ActionStateManager::new();
        for i in 0..105 {
            mgr.register_action("search", vec![json!(format!("query {i}"))]);
        }
        mgr.register_action("browse", vec![json!("single page")]);
        let inner = mgr.inner.lock().unwrap();
        assert_eq!(inner.attempt_counts["search"].len(), 50);
        assert_eq!(inner.attempt_counts["browse"].len(), 1);
    }

    #[test]
    fn cleanup_removes_old_completed_actions() {
        let mgr = ActionStateManager::new();
        let id = mgr.register_action("search", vec![json!("weather")]);
        mgr.complete_action(&id, json!({"ok": true}));
        {
            let mut inner = mgr.inner.lock().unwrap();
            inner.actions.get_mut(&id).unwrap().completed_at = Some(Utc::now() - Duration::seconds(400));
        }
        let removed = mgr.cleanup_old_actions(Duration::seconds(300));
        assert_eq!(removed, 1);
    }
}
