use std::sync::Arc;
use std::time::Duration as StdDuration;

use cortex_actions::ActionStateManager;
use cortex_buffer::ThoughtBuffer;
use cortex_core::{EventSource, Priority};
use cortex_instructions::InstructionTracker;
use serde_json::Value;
use tracing::warn;

use crate::registry::ToolRegistry;

/// One queued tool invocation, either the special "fetch this tool's
/// instructions" action or a regular command call (§4.4).
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub tool_name: String,
    pub command: String,
    pub args: Vec<Value>,
    pub is_instruction_request: bool,
}

impl ToolRequest {
    pub fn instructions(tool_name: impl Into<String>) -> Self {
        Self { tool_name: tool_name.into(), command: "instructions".to_string(), args: vec![], is_instruction_request: true }
    }

    pub fn call(tool_name: impl Into<String>, command: impl Into<String>, args: Vec<Value>) -> Self {
        Self { tool_name: tool_name.into(), command: command.into(), args, is_instruction_request: false }
    }
}

/// Outcome of dispatching a single [`ToolRequest`]: either the action ran to
/// completion (success, failure, or timeout — all already recorded and
/// reflected in a buffer thought by the time this returns), or the request
/// was rejected before registration (and a thought was already injected).
#[derive(Debug)]
pub enum DispatchOutcome {
    Dispatched { action_id: cortex_core::ActionId },
    Rejected { reason: String },
}

/// Cap on instruction-retrieval requests serviced per engine tick, so a
/// pathological burst of `instructions` calls can't starve regular actions
/// (§4.4).
const MAX_INSTRUCTION_REQUESTS_PER_TICK: usize = 3;

/// Dispatches queued tool requests against the registry, gated by the
/// instruction tracker and the action-state manager (C4).
pub struct ToolExecutionEngine {
    registry: Arc<ToolRegistry>,
    actions: Arc<ActionStateManager>,
    instructions: Arc<InstructionTracker>,
    buffer: Arc<ThoughtBuffer>,
}

impl ToolExecutionEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        actions: Arc<ActionStateManager>,
        instructions: Arc<InstructionTracker>,
        buffer: Arc<ThoughtBuffer>,
    ) -> Self {
        Self { registry, actions, instructions, buffer }
    }

    /// Process a batch of requests for one tick: instruction-retrieval
    /// requests first (capped), then regular actions in order, each checked
    /// independently so one rejection never blocks the rest of the batch.
    pub async fn process_batch(&self, requests: Vec<ToolRequest>) -> Vec<DispatchOutcome> {
        let (instruction_reqs, regular_reqs): (Vec<_>, Vec<_>) =
            requests.into_iter().partition(|r| r.is_instruction_request);

        let mut outcomes = Vec::new();
        for req in instruction_reqs.into_iter().take(MAX_INSTRUCTION_REQUESTS_PER_TICK) {
            outcomes.push(self.dispatch_instructions(&req.tool_name).await);
        }
        for req in regular_reqs {
            outcomes.push(self.dispatch_action(req).await);
        }
        outcomes
    }

    async fn dispatch_instructions(&self, tool_name: &str) -> DispatchOutcome {
        if !self.registry.exists(tool_name) {
            self.reject(tool_name, "tool does not exist");
            return DispatchOutcome::Rejected { reason: "tool does not exist".to_string() };
        }
        self.instructions.mark_instructions_retrieved(tool_name);
        let manifest = self.registry.manifest(tool_name);
        let content = manifest.map(|m| m.detailed_instructions()).unwrap_or_default();
        self.buffer.add_processed_thought(
            format!("Retrieved instructions for {tool_name}:\n{content}"),
            EventSource::ToolResult,
            tool_name,
            Some(Priority::Medium),
            None,
        );
        DispatchOutcome::Rejected { reason: "instructions only, no action registered".to_string() }
    }

    fn reject(&self, tool_name: &str, reason: &str) {
        warn!(tool = tool_name, reason, "tool request rejected");
        self.buffer.add_processed_thought(
            format!("Could not use {tool_name}: {reason}"),
            EventSource::ToolFailed,
            tool_name,
            Some(Priority::High),
            None,
        );
    }

    /// The ordered check sequence from §4.4: existence, not-already-running,
    /// instruction gate, availability. Each failure injects a HIGH-priority
    /// thought and aborts only this action. Execution is awaited inline so
    /// actions within one batch run strictly one after another; only
    /// separate batches may overlap (§4.4).
    async fn dispatch_action(&self, req: ToolRequest) -> DispatchOutcome {
        let tool_name = req.tool_name.clone();

        if !self.registry.exists(&tool_name) {
            self.reject(&tool_name, "tool does not exist");
            return DispatchOutcome::Rejected { reason: "tool does not exist".to_string() };
        }
        if !self.registry.is_enabled(&tool_name) {
            self.reject(&tool_name, "tool is disabled");
            return DispatchOutcome::Rejected { reason: "tool is disabled".to_string() };
        }
        if self.actions.is_tool_currently_executing(&tool_name) {
            self.reject(&tool_name, "tool is already running");
            return DispatchOutcome::Rejected { reason: "tool is already running".to_string() };
        }
        if !self.instructions.has_active_instructions(&tool_name) {
            self.reject(&tool_name, "instructions not retrieved within the active window");
            return DispatchOutcome::Rejected {
                reason: "instructions not retrieved within the active window".to_string(),
            };
        }
        let Some(tool) = self.registry.instance(&tool_name) else {
            self.reject(&tool_name, "tool is unavailable");
            return DispatchOutcome::Rejected { reason: "tool is unavailable".to_string() };
        };
        if !tool.is_available().await {
            self.reject(&tool_name, "tool is unavailable");
            return DispatchOutcome::Rejected { reason: "tool is unavailable".to_string() };
        }

        let manifest = self.registry.manifest(&tool_name);
        let timeout_secs = manifest.as_ref().map(|m| m.timeout_seconds).unwrap_or(30);

        let action_id = self.actions.register_action(tool_name.clone(), req.args.clone());
        self.actions.mark_in_progress(&action_id);

        let result = tokio::time::timeout(
            StdDuration::from_secs(timeout_secs),
            tool.execute(&req.command, req.args.clone()),
        )
        .await;

        match result {
            Ok(outcome) if !outcome.is_error => {
                self.actions.complete_action(&action_id, Value::String(outcome.content.clone()));
                self.buffer.add_processed_thought(
                    format!("{tool_name} completed: {}", outcome.content),
                    EventSource::ToolResult,
                    action_id.to_string(),
                    Some(Priority::Medium),
                    None,
                );
            }
            Ok(outcome) => {
                self.actions.fail_action(&action_id, outcome.content.clone(), Some("tool_error".to_string()));
                self.buffer.add_processed_thought(
                    format!("{tool_name} failed: {}", outcome.content),
                    EventSource::ToolFailed,
                    action_id.to_string(),
                    Some(Priority::High),
                    None,
                );
            }
            Err(_) => {
                self.actions.mark_timeout(&action_id);
                self.buffer.add_processed_thought(
                    format!("{tool_name} timed out after {timeout_secs}s"),
                    EventSource::ToolTimeout,
                    action_id.to_string(),
                    Some(Priority::High),
                    None,
                );
            }
        }

        DispatchOutcome::Dispatched { action_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ToolManifest;
    use crate::tool::{Tool, ToolOutcome};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        async fn execute(&self, command: &str, args: Vec<Value>) -> ToolOutcome {
            ToolOutcome::success(format!("{command}:{args:?}"))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        async fn execute(&self, _command: &str, _args: Vec<Value>) -> ToolOutcome {
            tokio::time::sleep(StdDuration::from_secs(5)).await;
            ToolOutcome::success("too late")
        }
    }

    fn manifest(name: &str, timeout_seconds: u64) -> ToolManifest {
        ToolManifest {
            tool_name: name.to_string(),
            control_variable_name: name.to_string(),
            tool_description: "test tool".to_string(),
            available_commands: vec![],
            tool_usage_guidance: vec![],
            tool_usage_examples: vec![],
            timeout_seconds,
            cooldown_seconds: 0,
            metadata: Default::default(),
        }
    }

    fn setup() -> (Arc<ToolRegistry>, Arc<ActionStateManager>, Arc<InstructionTracker>, Arc<ThoughtBuffer>) {
        (
            Arc::new(ToolRegistry::new()),
            Arc::new(ActionStateManager::new()),
            Arc::new(InstructionTracker::with_ttl_secs(360)),
            Arc::new(ThoughtBuffer::new(25)),
        )
    }

    #[tokio::test]
    async fn rejects_unknown_tool() {
        let (registry, actions, instructions, buffer) = setup();
        let engine = ToolExecutionEngine::new(registry, actions, instructions, buffer.clone());
        let outcome = engine.dispatch_action(ToolRequest::call("ghost", "run", vec![])).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
        assert!(buffer.get_thoughts_for_response().iter().any(|t| t.contains("does not exist")));
    }

    #[tokio::test]
    async fn instruction_gate_blocks_call_until_retrieved() {
        let (registry, actions, instructions, buffer) = setup();
        registry.register(manifest("echo", 5), Box::new(|| Arc::new(EchoTool)));
        registry.enable("echo").await;
        let engine = ToolExecutionEngine::new(registry, actions, instructions, buffer.clone());

        let rejected = engine.dispatch_action(ToolRequest::call("echo", "run", vec![])).await;
        assert!(matches!(rejected, DispatchOutcome::Rejected { .. }));
        assert!(buffer.get_thoughts_for_response().iter().any(|t| t.contains("instructions not retrieved")));

        engine.dispatch_instructions("echo").await;
        let dispatched = engine.dispatch_action(ToolRequest::call("echo", "run", vec![])).await;
        assert!(matches!(dispatched, DispatchOutcome::Dispatched { .. }));
    }

    #[tokio::test]
    async fn disabled_tool_is_rejected() {
        let (registry, actions, instructions, buffer) = setup();
        registry.register(manifest("echo", 5), Box::new(|| Arc::new(EchoTool)));
        let engine = ToolExecutionEngine::new(registry, actions, instructions, buffer.clone());
        let outcome = engine.dispatch_action(ToolRequest::call("echo", "run", vec![])).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn timeout_marks_action_failed_and_injects_thought() {
        let (registry, actions, instructions, buffer) = setup();
        registry.register(manifest("slow", 0), Box::new(|| Arc::new(SlowTool)));
        registry.enable("slow").await;
        instructions.mark_instructions_retrieved("slow");
        let engine = ToolExecutionEngine::new(registry, actions.clone(), instructions, buffer.clone());

        let outcome = engine.dispatch_action(ToolRequest::call("slow", "run", vec![])).await;
        let DispatchOutcome::Dispatched { action_id } = outcome else {
            panic!("expected dispatch");
        };
        // dispatch_action awaits the timeout inline, so the action is already
        // resolved by the time it returns; no need to wait for it separately.
        let pending = actions.get_pending_actions();
        assert!(pending.iter().all(|a| a.action_id != action_id));
    }

    #[tokio::test]
    async fn already_running_tool_is_rejected() {
        let (registry, actions, instructions, buffer) = setup();
        registry.register(manifest("echo", 5), Box::new(|| Arc::new(EchoTool)));
        registry.enable("echo").await;
        instructions.mark_instructions_retrieved("echo");
        let engine = ToolExecutionEngine::new(registry, actions.clone(), instructions, buffer.clone());

        actions.register_action("echo", vec![]);
        let outcome = engine.dispatch_action(ToolRequest::call("echo", "run", vec![])).await;
        assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn instruction_requests_capped_per_tick() {
        let (registry, actions, instructions, buffer) = setup();
        for i in 0..5 {
            registry.register(manifest(&format!("tool{i}"), 5), Box::new(|| Arc::new(EchoTool)));
        }
        let engine = ToolExecutionEngine::new(registry, actions, instructions.clone(), buffer);
        let requests: Vec<_> = (0..5).map(|i| ToolRequest::instructions(format!("tool{i}"))).collect();
        engine.process_batch(requests).await;
        assert_eq!(instructions.get_active_tool_names().len(), MAX_INSTRUCTION_REQUESTS_PER_TICK);
    }
}
