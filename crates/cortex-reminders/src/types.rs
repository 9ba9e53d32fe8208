use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    Reminder,
    Timer,
    Event,
}

impl ReminderType {
    /// Timers and events default urgent; plain reminders don't unless the
    /// caller explicitly flags them (§10, supplemented from the original
    /// reminder subsystem).
    pub fn default_urgency(&self) -> bool {
        matches!(self, ReminderType::Timer | ReminderType::Event)
    }
}

/// How a reminder recurs after firing once, parsed from `"daily|HH:MM"` or
/// `"interval|N"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatInterval {
    Daily { hour: u8, minute: u8 },
    Interval { every_secs: u64 },
}

impl RepeatInterval {
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut parts = s.splitn(2, '|');
        let kind = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("");
        match kind {
            "daily" => {
                let mut time = rest.splitn(2, ':');
                let hour: u8 = time.next().unwrap_or("").parse().map_err(|_| "daily|HH:MM — invalid hour".to_string())?;
                let minute: u8 = time.next().unwrap_or("").parse().map_err(|_| "daily|HH:MM — invalid minute".to_string())?;
                if hour > 23 || minute > 59 {
                    return Err(format!("daily|HH:MM — time {hour:02}:{minute:02} is out of range"));
                }
                Ok(RepeatInterval::Daily { hour, minute })
            }
            "interval" => {
                let secs: u64 = rest.parse().map_err(|_| "interval|N — N must be a positive integer".to_string())?;
                if secs == 0 {
                    return Err("interval|N — N must be greater than 0".to_string());
                }
                Ok(RepeatInterval::Interval { every_secs: secs })
            }
            other => Err(format!("unknown recurring type '{other}': use 'daily|HH:MM' or 'interval|N'")),
        }
    }
}

/// A scheduled reminder, timer, or event (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub description: String,
    pub trigger_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub repeat_interval: Option<RepeatInterval>,
    pub notified: bool,
    pub is_urgent: bool,
}

impl Reminder {
    pub fn new(
        description: impl Into<String>,
        trigger_time: DateTime<Utc>,
        reminder_type: ReminderType,
        repeat_interval: Option<RepeatInterval>,
        is_urgent_override: Option<bool>,
    ) -> Self {
        let is_urgent = is_urgent_override.unwrap_or_else(|| reminder_type.default_urgency());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            trigger_time,
            created_at: Utc::now(),
            reminder_type,
            repeat_interval,
            notified: false,
            is_urgent,
        }
    }

    /// The next trigger instant if this reminder repeats, computed relative
    /// to the instant it just fired.
    pub fn next_occurrence(&self, fired_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.repeat_interval {
            None => None,
            Some(RepeatInterval::Interval { every_secs }) => Some(fired_at + chrono::Duration::seconds(*every_secs as i64)),
            Some(RepeatInterval::Daily { hour, minute }) => {
                use chrono::{Datelike, TimeZone};
                let candidate = Utc
                    .with_ymd_and_hms(fired_at.year(), fired_at.month(), fired_at.day(), *hour as u32, *minute as u32, 0)
                    .single()?;
                if candidate > fired_at {
                    Some(candidate)
                } else {
                    Some(candidate + chrono::Duration::days(1))
                }
            }
        }
    }
}

/// Persisted file shape (§6): `{reminders:[Reminder], last_saved}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReminderFile {
    pub reminders: Vec<Reminder>,
    pub last_saved: Option<DateTime<Utc>>,
}
