use serde::{Deserialize, Serialize};

/// Tool manifest (`information.json`), §6. Parsed once per tool directory at
/// registry startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub tool_name: String,
    pub control_variable_name: String,
    pub tool_description: String,
    #[serde(default)]
    pub available_commands: Vec<ToolCommand>,
    #[serde(default)]
    pub tool_usage_guidance: Vec<String>,
    #[serde(default)]
    pub tool_usage_examples: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub cooldown_seconds: u64,
    #[serde(default)]
    pub metadata: ToolMetadata,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCommand {
    pub command: String,
    pub description: String,
    pub format: String,
    #[serde(default)]
    pub arguments: Vec<ToolArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub display_name: Option<String>,
    pub category: Option<String>,
    pub gui_label: Option<String>,
    pub gui_icon: Option<String>,
}

impl ToolManifest {
    /// Load `information.json` from a tool's subdirectory.
    pub fn load(dir: &std::path::Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(dir.join("information.json"))?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// One-line summary used in the default (non-detailed) tool section of
    /// a prompt (§4.7).
    pub fn one_line(&self) -> String {
        format!("{}: {}", self.tool_name, self.tool_description)
    }

    /// Full manifest-derived usage block, shown only when the tool's
    /// instructions are active in the Instruction Persistence Tracker.
    pub fn detailed_instructions(&self) -> String {
        let mut out = format!("### {}\n{}\n", self.tool_name, self.tool_description);
        for cmd in &self.available_commands {
            out.push_str(&format!("- `{}`: {} (format: `{}`)\n", cmd.command, cmd.description, cmd.format));
            for arg in &cmd.arguments {
                out.push_str(&format!(
                    "  - {} ({}{}): {}\n",
                    arg.name,
                    arg.arg_type,
                    if arg.required { ", required" } else { "" },
                    arg.description
                ));
            }
        }
        if !self.tool_usage_guidance.is_empty() {
            out.push_str("Guidance:\n");
            for g in &self.tool_usage_guidance {
                out.push_str(&format!("- {g}\n"));
            }
        }
        for example in &self.tool_usage_examples {
            out.push_str(&format!("Example: {example}\n"));
        }
        out
    }
}
