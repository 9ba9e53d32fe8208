use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cortex_core::types::ControlVariable;
use tracing::{info, warn};

use crate::manifest::ToolManifest;
use crate::tool::Tool;

/// Builds a fresh tool instance. Rust has no safe dynamic module loading, so
/// the registry is populated with factory functions supplied by the binary
/// at startup (mirroring `build_tools()`'s explicit wiring) instead of
/// scanning for `.so`/`.dll` plugins.
pub type ToolFactory = Box<dyn Fn() -> Arc<dyn Tool> + Send + Sync>;

struct Entry {
    manifest: ToolManifest,
    factory: ToolFactory,
    instance: Option<Arc<dyn Tool>>,
    enabled: bool,
}

/// Discovers tool manifests, maps each to its `USE_<TOOL>` control variable,
/// and owns the enable/disable lifecycle (C3).
pub struct ToolRegistry {
    entries: Mutex<HashMap<String, Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Scan `manifest_dir` for `<tool>/information.json` files, returning the
    /// parsed manifests. Does not register anything; callers pair each
    /// manifest with a factory via [`ToolRegistry::register`].
    pub fn scan_manifests(manifest_dir: &std::path::Path) -> std::io::Result<Vec<ToolManifest>> {
        let mut manifests = Vec::new();
        if !manifest_dir.is_dir() {
            return Ok(manifests);
        }
        for entry in std::fs::read_dir(manifest_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            match ToolManifest::load(&entry.path()) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!(dir = %entry.path().display(), error = %e, "skipping malformed tool manifest"),
            }
        }
        Ok(manifests)
    }

    /// Register a tool with its manifest and factory. Starts disabled; the
    /// cognitive loop enables it via its control variable (§6).
    pub fn register(&self, manifest: ToolManifest, factory: ToolFactory) {
        let mut entries = self.entries.lock().expect("tool registry mutex poisoned");
        let name = manifest.tool_name.clone();
        entries.insert(name, Entry { manifest, factory, instance: None, enabled: false });
    }

    pub fn control_variable_for(&self, tool_name: &str) -> Option<ControlVariable> {
        let entries = self.entries.lock().expect("tool registry mutex poisoned");
        entries.get(tool_name).map(|e| ControlVariable::for_tool(&e.manifest.control_variable_name))
    }

    pub fn exists(&self, tool_name: &str) -> bool {
        self.entries.lock().expect("tool registry mutex poisoned").contains_key(tool_name)
    }

    pub fn is_enabled(&self, tool_name: &str) -> bool {
        self.entries
            .lock()
            .expect("tool registry mutex poisoned")
            .get(tool_name)
            .map(|e| e.enabled)
            .unwrap_or(false)
    }

    pub fn manifest(&self, tool_name: &str) -> Option<ToolManifest> {
        self.entries.lock().expect("tool registry mutex poisoned").get(tool_name).map(|e| e.manifest.clone())
    }

    pub fn list_manifests(&self) -> Vec<ToolManifest> {
        self.entries.lock().expect("tool registry mutex poisoned").values().map(|e| e.manifest.clone()).collect()
    }

    pub fn list_enabled_names(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("tool registry mutex poisoned")
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Instantiate (lazily, via the factory) and start a tool, marking it
    /// enabled.
    pub async fn enable(&self, tool_name: &str) -> bool {
        let instance = {
            let mut entries = self.entries.lock().expect("tool registry mutex poisoned");
            match entries.get_mut(tool_name) {
                Some(e) => {
                    if e.instance.is_none() {
                        e.instance = Some((e.factory)());
                    }
                    e.enabled = true;
                    e.instance.clone()
                }
                None => return false,
            }
        };
        if let Some(tool) = instance {
            tool.start().await;
            info!(tool = tool_name, "tool enabled");
            true
        } else {
            false
        }
    }

    /// Stop and disable a tool; its instance is retained so re-enabling
    /// doesn't require re-running the factory.
    pub async fn disable(&self, tool_name: &str) -> bool {
        let instance = {
            let mut entries = self.entries.lock().expect("tool registry mutex poisoned");
            match entries.get_mut(tool_name) {
                Some(e) => {
                    e.enabled = false;
                    e.instance.clone()
                }
                None => return false,
            }
        };
        if let Some(tool) = instance {
            tool.end().await;
            info!(tool = tool_name, "tool disabled");
            true
        } else {
            false
        }
    }

    /// The live instance for dispatch, if the tool is enabled.
    pub fn instance(&self, tool_name: &str) -> Option<Arc<dyn Tool>> {
        let entries = self.entries.lock().expect("tool registry mutex poisoned");
        entries.get(tool_name).filter(|e| e.enabled).and_then(|e| e.instance.clone())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolOutcome;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubTool {
        started: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            "stub"
        }
        async fn start(&self) {
            self.started.store(true, Ordering::SeqCst);
        }
        async fn end(&self) {
            self.started.store(false, Ordering::SeqCst);
        }
        async fn execute(&self, _command: &str, _args: Vec<Value>) -> ToolOutcome {
            ToolOutcome::success("ok")
        }
    }

    fn sample_manifest() -> ToolManifest {
        ToolManifest {
            tool_name: "stub".to_string(),
            control_variable_name: "stub".to_string(),
            tool_description: "a stub".to_string(),
            available_commands: vec![],
            tool_usage_guidance: vec![],
            tool_usage_examples: vec![],
            timeout_seconds: 5,
            cooldown_seconds: 0,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn enable_instantiates_and_starts() {
        let registry = ToolRegistry::new();
        let started = Arc::new(AtomicBool::new(false));
        let started_clone = started.clone();
        registry.register(sample_manifest(), Box::new(move || Arc::new(StubTool { started: started_clone.clone() })));

        assert!(!registry.is_enabled("stub"));
        assert!(registry.enable("stub").await);
        assert!(registry.is_enabled("stub"));
        assert!(started.load(Ordering::SeqCst));
        assert!(registry.instance("stub").is_some());
    }

    #[tokio::test]
    async fn disable_stops_but_keeps_instance() {
        let registry = ToolRegistry::new();
        let started = Arc::new(AtomicBool::new(false));
        let started_clone = started.clone();
        registry.register(sample_manifest(), Box::new(move || Arc::new(StubTool { started: started_clone.clone() })));
        registry.enable("stub").await;
        assert!(registry.disable("stub").await);
        assert!(!started.load(Ordering::SeqCst));
        assert!(registry.instance("stub").is_none());
        assert!(!registry.is_enabled("stub"));
    }

    #[test]
    fn control_variable_naming() {
        let registry = ToolRegistry::new();
        registry.register(sample_manifest(), Box::new(|| Arc::new(StubTool { started: Arc::new(AtomicBool::new(false)) })));
        assert_eq!(registry.control_variable_for("stub").unwrap().to_string(), "USE_STUB");
    }

    #[test]
    fn unknown_tool_reports_absent() {
        let registry = ToolRegistry::new();
        assert!(!registry.exists("ghost"));
        assert!(registry.manifest("ghost").is_none());
    }
}
