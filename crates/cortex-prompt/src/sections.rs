use cortex_core::Mode;

/// Personality injection is a fixed string per stage (§4.7): "thought" for
/// the three cognitive modes, "response" only for SPOKEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalityStage {
    Thought,
    Response,
}

impl PersonalityStage {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Spoken => PersonalityStage::Response,
            _ => PersonalityStage::Thought,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonalityStage::Thought => "thought",
            PersonalityStage::Response => "response",
        }
    }
}

/// Wraps a personality block under a heading naming its stage, with an
/// optional handful of retrieved exemplars appended underneath.
pub fn personality_section(identity: &str, stage: PersonalityStage, exemplars: &[String]) -> String {
    let mut out = format!("## Personality ({})\n{}", stage.as_str(), identity);
    if !exemplars.is_empty() {
        out.push_str("\n\nExamples of this voice:\n");
        for ex in exemplars {
            out.push_str("- ");
            out.push_str(ex);
            out.push('\n');
        }
    }
    out
}

pub fn recent_thoughts_section(thoughts: &[String]) -> String {
    if thoughts.is_empty() {
        return "## Recent thoughts\n(none yet)".to_string();
    }
    let mut out = String::from("## Recent thoughts\n");
    for t in thoughts {
        out.push_str(t);
        out.push('\n');
    }
    out
}

/// Per-mode static preamble. Kept short and imperative, matching the rest
/// of the section headers.
pub fn mode_instructions(mode: Mode) -> &'static str {
    match mode {
        Mode::Responsive => {
            "## Instructions\nA new event arrived for each numbered item below. Produce one \
             numbered thought per event reacting to it, plus an optional strategic `<think>` \
             block, plus an `<action_list>` of any tool calls that follow from those events."
        }
        Mode::Planning => {
            "## Instructions\nThe user spoke recently. Produce a single thought that moves your \
             plan for helping them forward. Do not invent new user requests."
        }
        Mode::Reflective => {
            "## Instructions\nNothing urgent is pending. Produce a single reflective thought \
             drawing on your memory and recent experience."
        }
        Mode::Spoken => {
            "## Instructions\nA reply is owed right now. Compose the thought that will become \
             your spoken response, grounded only in what is actually in the thought buffer."
        }
    }
}

/// Default one-line-per-tool summary, used when no instruction grant is
/// active for any tool.
pub fn tool_section_summary(one_liners: &[String]) -> String {
    if one_liners.is_empty() {
        return "## Tools\n(no tools enabled)".to_string();
    }
    let mut out = String::from("## Tools\n");
    for line in one_liners {
        out.push_str("- ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Detailed manifest instructions for tools whose instruction grant is
/// currently active, interleaved with the one-line summary for the rest.
pub fn tool_section_detailed(one_liners: &[String], detailed: &[String]) -> String {
    let mut out = tool_section_summary(one_liners);
    if !detailed.is_empty() {
        out.push_str("\nDetailed usage (instructions were just retrieved for these):\n");
        for d in detailed {
            out.push_str(d);
            out.push('\n');
        }
    }
    out
}

pub fn grounding_rules(has_vision: bool) -> String {
    let mut rules = String::from(
        "## Grounding rules\n\
         - Never claim a tool result you did not actually receive.\n\
         - Never invent a user message; only react to what is in the thought buffer or events.\n\
         - If unsure, say so rather than fabricating detail.",
    );
    if has_vision {
        rules.push_str(
            "\n- A vision result is present; describe only what it reports, never what you assume is in frame.",
        );
    }
    rules
}

pub fn output_format_spec(mode: Mode) -> &'static str {
    match mode {
        Mode::Responsive => {
            "## Output format\n<thoughts>\n[1] first thought\n[2] second thought\n</thoughts>\n\
             <think>optional strategic thought</think>\n<action_list>[{\"tool\":\"name.command\",\"args\":[\"…\"]}]</action_list>"
        }
        _ => {
            "## Output format\n<thoughts>\n[1] the single thought\n</thoughts>\n\
             <think>optional strategic thought</think>\n<action_list>[]</action_list>"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_matches_mode() {
        assert_eq!(PersonalityStage::for_mode(Mode::Spoken), PersonalityStage::Response);
        assert_eq!(PersonalityStage::for_mode(Mode::Responsive), PersonalityStage::Thought);
        assert_eq!(PersonalityStage::for_mode(Mode::Planning), PersonalityStage::Thought);
        assert_eq!(PersonalityStage::for_mode(Mode::Reflective), PersonalityStage::Thought);
    }

    #[test]
    fn empty_thoughts_render_placeholder() {
        assert!(recent_thoughts_section(&[]).contains("none yet"));
    }

    #[test]
    fn detailed_section_includes_summary_and_detail() {
        let one_liners = vec!["search - looks things up".to_string()];
        let detailed = vec!["search: full usage text".to_string()];
        let out = tool_section_detailed(&one_liners, &detailed);
        assert!(out.contains("search - looks things up"));
        assert!(out.contains("full usage text"));
    }

    #[test]
    fn vision_adds_extra_grounding_clause() {
        assert!(!grounding_rules(false).contains("vision"));
        assert!(grounding_rules(true).contains("vision"));
    }
}
