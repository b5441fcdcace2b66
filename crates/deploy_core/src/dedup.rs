use std::collections::{HashMap, HashSet};

use crate::cursor::LogLine;

/// Number of leading characters that identify a message.
pub const FINGERPRINT_CHARS: usize = 100;

pub fn fingerprint(text: &str) -> String {
    text.chars().take(FINGERPRINT_CHARS).collect()
}

/// Suppresses content already shown in this session.
///
/// Tailed lines are keyed by offset (redelivery) and by content fingerprint
/// (repeated text). The overwrite-style activity feed is keyed by task and only
/// lets a message through when it differs from the last one for that task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deduplicator {
    last_offset: Option<u64>,
    seen: HashSet<String>,
    task_messages: HashMap<String, String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the line is new and should be processed.
    pub fn admit(&mut self, line: &LogLine) -> bool {
        if self.last_offset.is_some_and(|last| line.offset <= last) {
            return false;
        }
        self.last_offset = Some(line.offset);
        self.seen.insert(fingerprint(&line.text))
    }

    /// Returns true if `message` differs from the last one stored for `key`.
    pub fn admit_task(&mut self, key: &str, message: &str) -> bool {
        if self.task_messages.get(key).is_some_and(|last| last == message) {
            return false;
        }
        self.task_messages
            .insert(key.to_string(), message.to_string());
        true
    }

    pub fn fingerprint_count(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_offset.is_none() && self.seen.is_empty() && self.task_messages.is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
