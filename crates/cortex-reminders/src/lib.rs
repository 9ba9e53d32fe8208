pub mod store;
pub mod types;

pub use store::ReminderStore;
pub use types::{Reminder, ReminderFile, ReminderType, RepeatInterval};
