use cortex_core::Mode;

use crate::sections::{
    grounding_rules, mode_instructions, output_format_spec, personality_section,
    recent_thoughts_section, tool_section_detailed, tool_section_summary, PersonalityStage,
};

/// Shared inputs every constructor needs regardless of mode.
pub struct PromptInputs<'a> {
    pub identity: &'a str,
    pub personality_exemplars: &'a [String],
    pub recent_thoughts: &'a [String],
    pub tool_one_liners: &'a [String],
    pub active_tool_instructions: &'a [String],
    pub has_vision: bool,
}

/// The enriched context loaded only when the processed-thought count is
/// below `STARTUP_THOUGHT_THRESHOLD` and the REFLECTIVE constructor is
/// forced (§4.7 startup special case).
pub struct StartupContext<'a> {
    pub core_identity: &'a str,
    pub personality_exemplars: &'a [String],
    pub recent_summaries: &'a [String],
    pub yesterday_context: &'a [String],
    pub recent_short_memory: &'a [String],
}

fn tool_section(inputs: &PromptInputs<'_>) -> String {
    if inputs.active_tool_instructions.is_empty() {
        tool_section_summary(inputs.tool_one_liners)
    } else {
        tool_section_detailed(inputs.tool_one_liners, inputs.active_tool_instructions)
    }
}

fn assemble(mode: Mode, inputs: &PromptInputs<'_>, situational: &str) -> String {
    let stage = PersonalityStage::for_mode(mode);
    let sections = [
        personality_section(inputs.identity, stage, inputs.personality_exemplars),
        recent_thoughts_section(inputs.recent_thoughts),
        mode_instructions(mode).to_string(),
        tool_section(inputs),
        format!("## Situational context\n{situational}"),
        grounding_rules(inputs.has_vision),
        output_format_spec(mode).to_string(),
    ];
    sections.join("\n\n")
}

/// RESPONSIVE: situational context is the raw list of new events, one per
/// line, since the model is asked to produce one thought per event.
pub fn build_responsive_prompt(inputs: &PromptInputs<'_>, events: &[String]) -> String {
    let situational = if events.is_empty() {
        "(no new events)".to_string()
    } else {
        events
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {e}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assemble(Mode::Responsive, inputs, &situational)
}

/// PLANNING: situational context reports how long it has been since the
/// user last spoke.
pub fn build_planning_prompt(inputs: &PromptInputs<'_>, time_since_user_secs: i64) -> String {
    let situational = format!("It has been {time_since_user_secs}s since the user last spoke.");
    assemble(Mode::Planning, inputs, &situational)
}

/// REFLECTIVE: situational context is retrieved memory, normally. When
/// `startup` is present the enriched startup context replaces it entirely
/// (§4.7), on top of the ordinary personality/thoughts/tools sections.
pub fn build_reflective_prompt(
    inputs: &PromptInputs<'_>,
    memory_context: &[String],
    startup: Option<&StartupContext<'_>>,
) -> String {
    match startup {
        Some(ctx) => {
            let mut parts = Vec::new();
            parts.push(format!("Core identity:\n{}", ctx.core_identity));
            if !ctx.personality_exemplars.is_empty() {
                parts.push(format!(
                    "Personality examples:\n{}",
                    ctx.personality_exemplars.join("\n")
                ));
            }
            if !ctx.recent_summaries.is_empty() {
                parts.push(format!("Recent day summaries:\n{}", ctx.recent_summaries.join("\n")));
            }
            if !ctx.yesterday_context.is_empty() {
                parts.push(format!("Yesterday:\n{}", ctx.yesterday_context.join("\n")));
            }
            if !ctx.recent_short_memory.is_empty() {
                parts.push(format!(
                    "Recent conversation:\n{}",
                    ctx.recent_short_memory.join("\n")
                ));
            }
            assemble(Mode::Reflective, inputs, &parts.join("\n\n"))
        }
        None => {
            let situational = if memory_context.is_empty() {
                "(no relevant memories retrieved)".to_string()
            } else {
                memory_context.join("\n")
            };
            assemble(Mode::Reflective, inputs, &situational)
        }
    }
}

/// SPOKEN: no extra situational payload beyond recent thoughts, which
/// already carry whatever triggered the spoken reply.
pub fn build_spoken_prompt(inputs: &PromptInputs<'_>) -> String {
    assemble(Mode::Spoken, inputs, "A spoken reply is due now.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PromptInputs<'static> {
        PromptInputs {
            identity: "You are Cortex, a calm and curious assistant.",
            personality_exemplars: &[],
            recent_thoughts: &["[MEDIUM] user said hello".to_string()],
            tool_one_liners: &["search - looks things up".to_string()],
            active_tool_instructions: &[],
            has_vision: false,
        }
    }

    #[test]
    fn responsive_numbers_each_event() {
        let events = vec!["user waved".to_string(), "timer fired".to_string()];
        let prompt = build_responsive_prompt(&inputs(), &events);
        assert!(prompt.contains("1. user waved"));
        assert!(prompt.contains("2. timer fired"));
        assert!(prompt.contains("## Situational context"));
    }

    #[test]
    fn planning_reports_elapsed_time() {
        let prompt = build_planning_prompt(&inputs(), 42);
        assert!(prompt.contains("42s"));
    }

    #[test]
    fn reflective_without_startup_uses_memory_context() {
        let memories = vec!["remembered: the user likes tea".to_string()];
        let prompt = build_reflective_prompt(&inputs(), &memories, None);
        assert!(prompt.contains("remembered: the user likes tea"));
    }

    #[test]
    fn reflective_with_startup_overrides_situational_section() {
        let startup = StartupContext {
            core_identity: "I am Cortex.",
            personality_exemplars: &["an exemplar line".to_string()],
            recent_summaries: &["day 1: talked about tea".to_string()],
            yesterday_context: &["yesterday: discussed plans".to_string()],
            recent_short_memory: &["user: hi".to_string()],
        };
        let prompt = build_reflective_prompt(&inputs(), &[], Some(&startup));
        assert!(prompt.contains("I am Cortex."));
        assert!(prompt.contains("day 1: talked about tea"));
        assert!(prompt.contains("discussed plans"));
        assert!(prompt.contains("user: hi"));
    }

    #[test]
    fn spoken_prompt_includes_response_stage_personality() {
        let prompt = build_spoken_prompt(&inputs());
        assert!(prompt.contains("## Personality (response)"));
    }

    #[test]
    fn active_instructions_switch_tool_section_to_detailed() {
        let mut inp = inputs();
        let detailed = vec!["search: full usage".to_string()];
        inp.active_tool_instructions = &detailed;
        let prompt = build_spoken_prompt(&inp);
        assert!(prompt.contains("full usage"));
    }

    #[test]
    fn vision_flag_adds_grounding_clause() {
        let mut inp = inputs();
        inp.has_vision = true;
        let prompt = build_spoken_prompt(&inp);
        assert!(prompt.contains("vision result is present"));
    }
}
