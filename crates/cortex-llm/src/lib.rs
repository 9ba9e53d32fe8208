pub mod client;

pub use client::{
    cosine_similarity, is_acceptable_single_thought, parse_lm_output, ActionCall, EmbeddingClient,
    LanguageModelClient, ParsedOutput,
};
