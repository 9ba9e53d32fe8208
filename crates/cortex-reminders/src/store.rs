use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use cortex_core::error::{CoreError, Result};
use tracing::{info, warn};

use crate::types::{Reminder, ReminderFile, ReminderType, RepeatInterval};

/// Owns the reminder/timer/event list and its `reminders.json` persistence.
pub struct ReminderStore {
    inner: Mutex<ReminderFile>,
    path: PathBuf,
}

impl ReminderStore {
    pub fn load(data_dir: &str) -> Result<Self> {
        let dir = PathBuf::from(data_dir);
        std::fs::create_dir_all(&dir).map_err(|e| CoreError::MemoryIoFailure { path: dir.display().to_string(), reason: e.to_string() })?;
        let path = dir.join("reminders.json");

        let file = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| CoreError::MemoryIoFailure { path: path.display().to_string(), reason: e.to_string() })?;
            if text.trim().is_empty() {
                ReminderFile::default()
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| CoreError::MemoryIoFailure { path: path.display().to_string(), reason: e.to_string() })?
            }
        } else {
            ReminderFile::default()
        };

        info!(count = file.reminders.len(), "reminders loaded");
        Ok(Self { inner: Mutex::new(file), path })
    }

    pub fn add(
        &self,
        description: impl Into<String>,
        trigger_time: chrono::DateTime<Utc>,
        reminder_type: ReminderType,
        repeat_interval: Option<RepeatInterval>,
        is_urgent_override: Option<bool>,
    ) -> Result<Reminder> {
        let reminder = Reminder::new(description, trigger_time, reminder_type, repeat_interval, is_urgent_override);
        {
            let mut inner = self.inner.lock().expect("reminder store mutex poisoned");
            inner.reminders.push(reminder.clone());
        }
        self.persist()?;
        Ok(reminder)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut inner = self.inner.lock().expect("reminder store mutex poisoned");
            let before = inner.reminders.len();
            inner.reminders.retain(|r| r.id != id);
            before != inner.reminders.len()
        };
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<Reminder> {
        self.inner.lock().expect("reminder store mutex poisoned").reminders.clone()
    }

    /// Reminders whose `trigger_time` has passed and haven't been notified
    /// yet. Recurring reminders are rescheduled in place; one-shot reminders
    /// are marked notified.
    pub fn due(&self, now: chrono::DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut fired = Vec::new();
        {
            let mut inner = self.inner.lock().expect("reminder store mutex poisoned");
            for reminder in inner.reminders.iter_mut() {
                if !reminder.notified && reminder.trigger_time <= now {
                    fired.push(reminder.clone());
                    match reminder.next_occurrence(now) {
                        Some(next) => reminder.trigger_time = next,
                        None => reminder.notified = true,
                    }
                }
            }
            inner.reminders.retain(|r| !(r.notified && r.repeat_interval.is_none()));
        }
        if !fired.is_empty() {
            self.persist()?;
        }
        Ok(fired)
    }

    pub fn has_urgent_due(&self, now: chrono::DateTime<Utc>) -> bool {
        let inner = self.inner.lock().expect("reminder store mutex poisoned");
        inner.reminders.iter().any(|r| !r.notified && r.is_urgent && r.trigger_time <= now)
    }

    fn persist(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("reminder store mutex poisoned");
        inner.last_saved = Some(Utc::now());
        let text = serde_json::to_string_pretty(&*inner)?;
        std::fs::write(&self.path, text).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "failed to persist reminders");
            CoreError::MemoryIoFailure { path: self.path.display().to_string(), reason: e.to_string() }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_and_list_round_trips() {
        let dir = tempdir().unwrap();
        let store = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
        store.add("take a break", Utc::now() + chrono::Duration::seconds(60), ReminderType::Reminder, None, None).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn timer_defaults_urgent_reminder_does_not() {
        let dir = tempdir().unwrap();
        let store = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
        let timer = store.add("oven", Utc::now(), ReminderType::Timer, None, None).unwrap();
        let plain = store.add("water plants", Utc::now(), ReminderType::Reminder, None, None).unwrap();
        assert!(timer.is_urgent);
        assert!(!plain.is_urgent);
    }

    #[test]
    fn due_marks_one_shot_notified_and_removes_it() {
        let dir = tempdir().unwrap();
        let store = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
        store.add("now", Utc::now() - chrono::Duration::seconds(5), ReminderType::Reminder, None, None).unwrap();
        let due = store.due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        assert!(store.list().is_empty());
    }

    #[test]
    fn due_reschedules_recurring_reminder() {
        let dir = tempdir().unwrap();
        let store = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
        store
            .add(
                "check logs",
                Utc::now() - chrono::Duration::seconds(5),
                ReminderType::Timer,
                Some(RepeatInterval::Interval { every_secs: 3600 }),
                None,
            )
            .unwrap();
        let due = store.due(Utc::now()).unwrap();
        assert_eq!(due.len(), 1);
        let remaining = store.list();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].trigger_time > Utc::now());
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempdir().unwrap();
        {
            let store = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
            store.add("persisted", Utc::now() + chrono::Duration::hours(1), ReminderType::Event, None, None).unwrap();
        }
        let reloaded = ReminderStore::load(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.list().len(), 1);
    }
}
