use cortex_core::{Mode, Priority};

/// Hints the prompt constructors use to decide which optional sections to
/// include, carried alongside the chosen mode rather than recomputed twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFlags {
    pub has_vision: bool,
    pub has_chat: bool,
    pub needs_memory_retrieval: bool,
    pub is_startup: bool,
    /// Set whenever the chosen mode is SPOKEN or REFLECTIVE, the two modes
    /// whose prompts should carry personality exemplars (§4.7 open questions).
    pub needs_personality_examples: bool,
}

fn mode_needs_personality_examples(mode: Mode) -> bool {
    matches!(mode, Mode::Spoken | Mode::Reflective)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeciderOutput {
    pub mode: Mode,
    pub needs_spoken_response: bool,
    pub priority_level: Priority,
    pub reasoning: String,
    pub context_flags: ContextFlags,
}

/// Inputs the decider reasons over. `recent_thoughts` are the formatted
/// `[PRIO] content` strings from the thought buffer (last 10, per the rule).
pub struct DeciderInput<'a> {
    pub recent_thoughts: &'a [String],
    pub has_urgent_reminders: bool,
    pub new_events_exist: bool,
    pub time_since_last_user_input_secs: Option<i64>,
    pub agent_name: &'a str,
    pub has_vision: bool,
    pub has_chat: bool,
    pub needs_memory_retrieval: bool,
    pub is_startup: bool,
}

const PLANNING_WINDOW_SECS: i64 = cortex_core::config::DEFAULT_PLANNING_WINDOW_SECS;

/// Picks one of the four prompt modes by the seven-step priority list (§4.7):
/// urgent reminders or a `[CRITICAL]` thought wins outright; `[HIGH]` or the
/// agent's own name being mentioned forces a spoken reply at lower urgency;
/// an unanswered question still forces speech but at MEDIUM; failing all of
/// that, it falls back to RESPONSIVE/PLANNING/REFLECTIVE by recency.
pub fn decide(input: &DeciderInput<'_>) -> DeciderOutput {
    let base_flags = ContextFlags {
        has_vision: input.has_vision,
        has_chat: input.has_chat,
        needs_memory_retrieval: input.needs_memory_retrieval,
        is_startup: input.is_startup,
        needs_personality_examples: false,
    };
    let flags_for = |mode: Mode| ContextFlags {
        needs_personality_examples: mode_needs_personality_examples(mode),
        ..base_flags.clone()
    };

    let has_critical = input.recent_thoughts.iter().any(|t| t.contains("[CRITICAL]"));
    if input.has_urgent_reminders || has_critical {
        return DeciderOutput {
            mode: Mode::Spoken,
            needs_spoken_response: true,
            priority_level: Priority::Critical,
            reasoning: "urgent reminder or a CRITICAL thought demands an immediate spoken reply".to_string(),
            context_flags: flags_for(Mode::Spoken),
        };
    }

    let has_high = input.recent_thoughts.iter().any(|t| t.contains("[HIGH]"));
    if has_high {
        return DeciderOutput {
            mode: Mode::Spoken,
            needs_spoken_response: true,
            priority_level: Priority::High,
            reasoning: "a HIGH-priority thought is waiting on a reply".to_string(),
            context_flags: flags_for(Mode::Spoken),
        };
    }

    let name_mentioned = !input.agent_name.is_empty()
        && input
            .recent_thoughts
            .iter()
            .any(|t| t.to_uppercase().contains(&input.agent_name.to_uppercase()));
    if name_mentioned {
        return DeciderOutput {
            mode: Mode::Spoken,
            needs_spoken_response: true,
            priority_level: Priority::High,
            reasoning: "the agent's own name appears in recent thoughts".to_string(),
            context_flags: flags_for(Mode::Spoken),
        };
    }

    let has_question = input.recent_thoughts.iter().any(|t| t.contains('?'));
    if has_question {
        return DeciderOutput {
            mode: Mode::Spoken,
            needs_spoken_response: true,
            priority_level: Priority::Medium,
            reasoning: "an unanswered question is sitting in recent thoughts".to_string(),
            context_flags: flags_for(Mode::Spoken),
        };
    }

    if input.new_events_exist {
        return DeciderOutput {
            mode: Mode::Responsive,
            needs_spoken_response: false,
            priority_level: Priority::Medium,
            reasoning: "new events are waiting to be turned into thoughts".to_string(),
            context_flags: flags_for(Mode::Responsive),
        };
    }

    if input
        .time_since_last_user_input_secs
        .map(|secs| secs < PLANNING_WINDOW_SECS)
        .unwrap_or(false)
    {
        return DeciderOutput {
            mode: Mode::Planning,
            needs_spoken_response: false,
            priority_level: Priority::Low,
            reasoning: "the user spoke recently; staying in a planning frame of mind".to_string(),
            context_flags: flags_for(Mode::Planning),
        };
    }

    DeciderOutput {
        mode: Mode::Reflective,
        needs_spoken_response: false,
        priority_level: Priority::Low,
        reasoning: "nothing pending; free to reflect".to_string(),
        context_flags: flags_for(Mode::Reflective),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> DeciderInput<'static> {
        DeciderInput {
            recent_thoughts: &[],
            has_urgent_reminders: false,
            new_events_exist: false,
            time_since_last_user_input_secs: None,
            agent_name: "Cortex",
            has_vision: false,
            has_chat: false,
            needs_memory_retrieval: false,
            is_startup: false,
        }
    }

    #[test]
    fn urgent_reminder_wins_over_everything() {
        let mut input = base_input();
        input.has_urgent_reminders = true;
        input.new_events_exist = true;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Spoken);
        assert_eq!(out.priority_level, Priority::Critical);
        assert!(out.needs_spoken_response);
    }

    #[test]
    fn critical_thought_beats_new_events() {
        let thoughts = vec!["[CRITICAL] the house is on fire".to_string()];
        let mut input = base_input();
        input.recent_thoughts = &thoughts;
        input.new_events_exist = true;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Spoken);
        assert_eq!(out.priority_level, Priority::Critical);
    }

    #[test]
    fn high_thought_forces_spoken_high() {
        let thoughts = vec!["[HIGH] user asked a direct question".to_string()];
        let mut input = base_input();
        input.recent_thoughts = &thoughts;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Spoken);
        assert_eq!(out.priority_level, Priority::High);
    }

    #[test]
    fn agent_name_mention_forces_spoken() {
        let thoughts = vec!["[LOW] someone in chat mentioned CORTEX by name".to_string()];
        let mut input = base_input();
        input.recent_thoughts = &thoughts;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Spoken);
        assert_eq!(out.priority_level, Priority::High);
    }

    #[test]
    fn question_mark_forces_spoken_medium() {
        let thoughts = vec!["[LOW] is anyone around?".to_string()];
        let mut input = base_input();
        input.recent_thoughts = &thoughts;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Spoken);
        assert_eq!(out.priority_level, Priority::Medium);
    }

    #[test]
    fn new_events_select_responsive() {
        let mut input = base_input();
        input.new_events_exist = true;
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Responsive);
        assert!(!out.needs_spoken_response);
    }

    #[test]
    fn recent_user_input_selects_planning() {
        let mut input = base_input();
        input.time_since_last_user_input_secs = Some(10);
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Planning);
    }

    #[test]
    fn stale_user_input_selects_reflective() {
        let mut input = base_input();
        input.time_since_last_user_input_secs = Some(10_000);
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Reflective);
    }

    #[test]
    fn no_user_input_ever_selects_reflective() {
        let input = base_input();
        let out = decide(&input);
        assert_eq!(out.mode, Mode::Reflective);
    }

    #[test]
    fn needs_personality_examples_set_for_spoken_and_reflective_only() {
        let thoughts = vec!["[HIGH] user asked a direct question".to_string()];
        let mut spoken_input = base_input();
        spoken_input.recent_thoughts = &thoughts;
        assert!(decide(&spoken_input).context_flags.needs_personality_examples);

        let reflective = decide(&base_input());
        assert_eq!(reflective.mode, Mode::Reflective);
        assert!(reflective.context_flags.needs_personality_examples);

        let mut responsive_input = base_input();
        responsive_input.new_events_exist = true;
        assert!(!decide(&responsive_input).context_flags.needs_personality_examples);

        let mut planning_input = base_input();
        planning_input.time_since_last_user_input_secs = Some(10);
        assert!(!decide(&planning_input).context_flags.needs_personality_examples);
    }

    #[test]
    fn context_flags_pass_through_unchanged() {
        let mut input = base_input();
        input.has_vision = true;
        input.has_chat = true;
        input.is_startup = true;
        let out = decide(&input);
        assert!(out.context_flags.has_vision);
        assert!(out.context_flags.has_chat);
        assert!(out.context_flags.is_startup);
    }
}
