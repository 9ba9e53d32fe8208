pub mod buffer;
pub mod types;

pub use buffer::ThoughtBuffer;
pub use types::{default_priority_for_source, refine_chat_priority, ChatMessage, Event, Thought};
