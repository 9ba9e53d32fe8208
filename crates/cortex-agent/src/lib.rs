pub mod features;
pub mod loop_engine;
pub mod response_generator;

pub use features::FeatureFlags;
pub use loop_engine::CognitiveLoop;
pub use response_generator::{LlmResponseGenerator, ResponseGenerator};
