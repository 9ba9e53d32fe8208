use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use cortex_core::config::INSTRUCTION_TTL_SECS;

/// Per-tool 6-minute TTL permitting tool use after its instructions were
/// fetched (C5). Forces the two-phase `instructions` → actual-call pattern
/// described in §4.5.
pub struct InstructionTracker {
    grants: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl InstructionTracker {
    pub fn new() -> Self {
        Self::with_ttl_secs(INSTRUCTION_TTL_SECS)
    }

    pub fn with_ttl_secs(ttl_secs: u64) -> Self {
        Self {
            grants: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Marks `tool`'s instructions as just retrieved. Returns whether this
    /// was a refresh of an existing (possibly still-live) grant. Resets the
    /// timestamp either way.
    pub fn mark_instructions_retrieved(&self, tool: &str) -> bool {
        let mut grants = self.grants.lock().expect("instruction tracker mutex poisoned");
        let was_present = grants.contains_key(tool);
        grants.insert(tool.to_string(), Utc::now());
        was_present
    }

    /// Lazy expiry: if the entry exists but is expired, remove it and
    /// return false.
    pub fn has_active_instructions(&self, tool: &str) -> bool {
        let mut grants = self.grants.lock().expect("instruction tracker mutex poisoned");
        match grants.get(tool) {
            Some(retrieved_at) => {
                if Utc::now() - *retrieved_at < self.ttl {
                    true
                } else {
                    grants.remove(tool);
                    false
                }
            }
            None => false,
        }
    }

    /// Sweeps expired entries, then returns the names of tools with a live
    /// grant.
    pub fn get_active_tool_names(&self) -> Vec<String> {
        let mut grants = self.grants.lock().expect("instruction tracker mutex poisoned");
        let now = Utc::now();
        let ttl = self.ttl;
        grants.retain(|_, retrieved_at| now - *retrieved_at < ttl);
        grants.keys().cloned().collect()
    }

    /// Called by the tool registry when a tool is disabled so its grant
    /// doesn't persist past deactivation.
    pub fn clear_instructions_for_disabled_tools(&self, enabled: &HashSet<String>) {
        let mut grants = self.grants.lock().expect("instruction tracker mutex poisoned");
        grants.retain(|tool, _| enabled.contains(tool));
    }
}

impl Default for InstructionTracker {
    fn default() -> Self {
        Self::new()
    }
}
