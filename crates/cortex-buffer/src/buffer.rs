use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use cortex_core::{EventSource, Priority};
use tracing::debug;

use crate::types::{default_priority_for_source, ChatMessage, Event, Thought};

struct Inner {
    raw_events: VecDeque<Event>,
    thoughts: VecDeque<Thought>,
    capacity: usize,
    last_user_input_at: Option<DateTime<Utc>>,
    consecutive_proactive_thoughts: u32,
    has_urgent_reminders: bool,
    unengaged_chat: VecDeque<ChatMessage>,
    engaged_indices: HashSet<u64>,
    next_chat_index: u64,
}

/// Bounded store of raw events and processed thoughts (C1).
///
/// All mutating operations are serialized via a single mutex; this mirrors
/// the "one coarse lock, hot path never blocks on I/O" policy used
/// throughout the core — nothing held under this lock ever awaits.
pub struct ThoughtBuffer {
    inner: Mutex<Inner>,
    shutdown_requested: AtomicBool,
}

impl ThoughtBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                raw_events: VecDeque::new(),
                thoughts: VecDeque::new(),
                capacity,
                last_user_input_at: None,
                consecutive_proactive_thoughts: 0,
                has_urgent_reminders: false,
                unengaged_chat: VecDeque::new(),
                engaged_indices: HashSet::new(),
                next_chat_index: 0,
            }),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// Append a raw event; no interpretation happens here.
    pub fn ingest_raw_data(&self, source: EventSource, data: impl Into<String>) {
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        let event = Event::new(source.clone(), data);
        if source == EventSource::UserInput {
            inner.last_user_input_at = Some(event.timestamp);
        }
        inner.raw_events.push_back(event);
    }

    /// Drain semantics: peek everything not yet marked processed.
    pub fn get_unprocessed_events(&self) -> Vec<Event> {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        inner.raw_events.iter().cloned().collect()
    }

    /// Remove the first `n` raw events (they have been turned into thoughts).
    pub fn mark_events_processed(&self, n: usize) {
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        for _ in 0..n.min(inner.raw_events.len()) {
            inner.raw_events.pop_front();
        }
    }

    /// Format and append a processed thought; evicts oldest on overflow.
    pub fn add_processed_thought(
        &self,
        content: impl Into<String>,
        source: EventSource,
        original_ref: impl Into<String>,
        priority_override: Option<Priority>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        let priority = priority_override.unwrap_or_else(|| default_priority_for_source(&source));
        let thought = Thought {
            content: content.into(),
            source,
            original_ref: original_ref.into(),
            priority,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            integrated: false,
        };
        if inner.thoughts.len() >= inner.capacity {
            inner.thoughts.pop_front();
        }
        inner.thoughts.push_back(thought);
    }

    /// Same as `add_processed_thought` but with `source = internal` and the
    /// proactive counter incremented (§4.1).
    pub fn add_proactive_thought(&self, content: impl Into<String>) {
        self.add_processed_thought(content, EventSource::Internal, "", Some(Priority::Low), None);
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        inner.consecutive_proactive_thoughts += 1;
    }

    /// Records the agent's just-spoken reply so future reflective thinking
    /// can see its own words.
    pub fn add_response_echo(&self, response_text: impl Into<String>, timestamp: DateTime<Utc>) {
        self.add_processed_thought(
            response_text,
            EventSource::Internal,
            "response_echo",
            Some(Priority::Low),
            Some(timestamp),
        );
    }

    /// Canonical formatted view used by the Response Decider and prompt
    /// constructors: each entry is `[PRIO] content`.
    pub fn get_thoughts_for_response(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        inner.thoughts.iter().map(Thought::formatted).collect()
    }

    /// The last `k` processed thoughts, oldest first.
    pub fn last_thoughts(&self, k: usize) -> Vec<Thought> {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        let len = inner.thoughts.len();
        let skip = len.saturating_sub(k);
        inner.thoughts.iter().skip(skip).cloned().collect()
    }

    pub fn thought_count(&self) -> usize {
        self.inner.lock().expect("thought buffer mutex poisoned").thoughts.len()
    }

    pub fn get_time_since_last_user_input(&self) -> Option<i64> {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        inner
            .last_user_input_at
            .map(|t| (Utc::now() - t).num_seconds())
    }

    pub fn has_urgent_reminders(&self) -> bool {
        self.inner.lock().expect("thought buffer mutex poisoned").has_urgent_reminders
    }

    pub fn set_has_urgent_reminders(&self, value: bool) {
        self.inner.lock().expect("thought buffer mutex poisoned").has_urgent_reminders = value;
    }

    pub fn consecutive_proactive_thoughts(&self) -> u32 {
        self.inner
            .lock()
            .expect("thought buffer mutex poisoned")
            .consecutive_proactive_thoughts
    }

    pub fn reset_consecutive_counter(&self) {
        self.inner
            .lock()
            .expect("thought buffer mutex poisoned")
            .consecutive_proactive_thoughts = 0;
    }

    /// Add a chat-platform message to the unengaged queue with a monotonic
    /// index; engagement is decided later by the cognitive loop.
    pub fn ingest_chat_message(
        &self,
        platform: impl Into<String>,
        username: impl Into<String>,
        message: impl Into<String>,
        has_bot_mention: bool,
    ) -> u64 {
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        let index = inner.next_chat_index;
        inner.next_chat_index += 1;
        inner.unengaged_chat.push_back(ChatMessage {
            index,
            platform: platform.into(),
            username: username.into(),
            message: message.into(),
            has_bot_mention,
            timestamp: Utc::now(),
        });
        debug!(index, "ingested chat message");
        index
    }

    /// Up to `max` not-yet-engaged messages, oldest first.
    pub fn get_unengaged_messages(&self, max: Option<usize>) -> Vec<ChatMessage> {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        let iter = inner
            .unengaged_chat
            .iter()
            .filter(|m| !inner.engaged_indices.contains(&m.index))
            .cloned();
        match max {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn mark_chat_engaged(&self, indices: &[u64]) {
        let mut inner = self.inner.lock().expect("thought buffer mutex poisoned");
        for idx in indices {
            inner.engaged_indices.insert(*idx);
        }
        // Drop fully-engaged entries from the front to bound memory growth.
        while let Some(front) = inner.unengaged_chat.front() {
            if inner.engaged_indices.contains(&front.index) {
                let idx = front.index;
                inner.unengaged_chat.pop_front();
                inner.engaged_indices.remove(&idx);
            } else {
                break;
            }
        }
    }

    pub fn should_engage_with_chat(&self) -> bool {
        let inner = self.inner.lock().expect("thought buffer mutex poisoned");
        inner
            .unengaged_chat
            .iter()
            .any(|m| !inner.engaged_indices.contains(&m.index))
    }

    pub fn force_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

impl Default for ThoughtBuffer {
    fn default() -> Self {
        Self::new(cortex_core::config::DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_over_capacity() {
        let buf = ThoughtBuffer::new(2);
        buf.add_processed_thought("one", EventSource::Internal, "", None, None);
        buf.add_processed_thought("two", EventSource::Internal, "", None, None);
        buf.add_processed_thought("three", EventSource::Internal, "", None, None);
        let thoughts = buf.get_thoughts_for_response();
        assert_eq!(thoughts.len(), 2);
        assert!(thoughts[0].contains("two"));
        assert!(thoughts[1].contains("three"));
    }

    #[test]
    fn priority_tag_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High, Priority::Critical] {
            let buf = ThoughtBuffer::new(10);
            buf.add_processed_thought("x", EventSource::Internal, "", Some(p), None);
            let thoughts = buf.get_thoughts_for_response();
            assert!(thoughts[0].contains(&format!("[{}]", p.tag())));
        }
    }

    #[test]
    fn event_to_thought_preserves_order_and_timestamp() {
        let buf = ThoughtBuffer::new(10);
        buf.ingest_raw_data(EventSource::UserInput, "hi");
        let events = buf.get_unprocessed_events();
        assert_eq!(events.len(), 1);
        let ts = events[0].timestamp;
        buf.add_processed_thought("user greeted me", EventSource::UserInput, "hi", None, Some(ts));
        buf.mark_events_processed(1);
        assert!(buf.get_unprocessed_events().is_empty());
        let last = buf.last_thoughts(1);
        assert_eq!(last[0].timestamp, ts);
        assert_eq!(last[0].priority, Priority::High);
    }

    #[test]
    fn chat_engagement_tracking() {
        let buf = ThoughtBuffer::new(10);
        let i0 = buf.ingest_chat_message("twitch", "alice", "hello", false);
        let i1 = buf.ingest_chat_message("twitch", "bob", "is anyone here?", false);
        assert!(buf.should_engage_with_chat());
        assert_eq!(buf.get_unengaged_messages(None).len(), 2);
        buf.mark_chat_engaged(&[i0]);
        let remaining = buf.get_unengaged_messages(None);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].index, i1);
    }

    #[test]
    fn shutdown_flag() {
        let buf = ThoughtBuffer::new(10);
        assert!(!buf.is_shutdown_requested());
        buf.force_shutdown();
        assert!(buf.is_shutdown_requested());
    }

    #[test]
    fn time_since_last_user_input_none_until_first_input() {
        let buf = ThoughtBuffer::new(10);
        assert!(buf.get_time_since_last_user_input().is_none());
        buf.ingest_raw_data(EventSource::UserInput, "hi");
        assert!(buf.get_time_since_last_user_input().unwrap() < 2);
    }
}
