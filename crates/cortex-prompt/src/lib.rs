pub mod constructors;
pub mod decider;
pub mod sections;

pub use constructors::{
    build_planning_prompt, build_reflective_prompt, build_responsive_prompt, build_spoken_prompt,
    PromptInputs, StartupContext,
};
pub use decider::{decide, ContextFlags, DeciderInput, DeciderOutput};
pub use sections::PersonalityStage;
