pub mod combine;
pub mod store;
pub mod trigger;
pub mod types;

pub use combine::CombineStrategy;
pub use store::MemoryStore;
pub use trigger::{detect_memory_needs, extract_reference_subject, MemoryNeed};
pub use types::{BaseHit, ExemplarStage, LongHit, MediumHit, MemoryRole};
