use std::collections::HashMap;
use std::sync::Mutex;

/// Default set of toggleable behaviors; unknown names toggle/set to a bare
/// `false`-defaulting entry rather than being rejected, matching the
/// control surface's permissive "new_value?" return.
const DEFAULT_FEATURES: &[(&str, bool)] =
    &[("vision", true), ("chat", true), ("memory_integration", true), ("reminders", true)];

/// Runtime-toggleable behavior switches, read by the cognitive loop each
/// tick. Mutex-guarded like every other piece of shared loop state.
pub struct FeatureFlags {
    inner: Mutex<HashMap<String, bool>>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        let map = DEFAULT_FEATURES.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Self { inner: Mutex::new(map) }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.inner.lock().expect("feature flags mutex poisoned").get(name).copied().unwrap_or(false)
    }

    /// Flips the named feature and returns the new value.
    pub fn toggle(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().expect("feature flags mutex poisoned");
        let entry = inner.entry(name.to_string()).or_insert(false);
        *entry = !*entry;
        *entry
    }

    pub fn set(&self, name: &str, value: bool) {
        let mut inner = self.inner.lock().expect("feature flags mutex poisoned");
        inner.insert(name.to_string(), value);
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_all_on() {
        let flags = FeatureFlags::new();
        assert!(flags.is_enabled("vision"));
        assert!(flags.is_enabled("chat"));
        assert!(flags.is_enabled("memory_integration"));
        assert!(flags.is_enabled("reminders"));
    }

    #[test]
    fn toggle_flips_and_returns_new_value() {
        let flags = FeatureFlags::new();
        let new_value = flags.toggle("vision");
        assert!(!new_value);
        assert!(!flags.is_enabled("vision"));
    }

    #[test]
    fn set_overrides_directly() {
        let flags = FeatureFlags::new();
        flags.set("reminders", false);
        assert!(!flags.is_enabled("reminders"));
    }

    #[test]
    fn unknown_feature_defaults_to_disabled() {
        let flags = FeatureFlags::new();
        assert!(!flags.is_enabled("nonexistent"));
    }
}
