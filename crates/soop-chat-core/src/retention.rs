//! Visibility rules, the capped event history, and the event store.
//!
//! The [`EventStore`] is the single entry point for accepted events:
//!
//! 1. assigns the next sequence index and stamps the current time,
//! 2. applies side effects carried by the event (a kick-display toggle
//!    rewrites the live kick-visibility switch),
//! 3. asks the [`VisibilityRules`] whether the event is kept,
//! 4. appends kept events to the [`RetentionBuffer`].
//!
//! The caller is told whether the event was retained but is expected to
//! forward *every* submitted event to its per-event callback.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::{ChatEvent, EventKind, EventPayload};
use crate::protocol::sequence::SequenceCounter;

/// Default number of events kept in the history.
pub const DEFAULT_RETENTION_THRESHOLD: usize = 100;

// ── Visibility rules ──────────────────────────────────────────────────────────

/// Per-category switches deciding which events are kept in the history.
///
/// Missing keys in a configuration file default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityRules {
    pub show_balloons: bool,
    pub show_kicks: bool,
    pub show_subscriptions: bool,
    pub show_follows: bool,
    pub show_mission: bool,
    pub show_mission_settle: bool,
}

impl Default for VisibilityRules {
    fn default() -> Self {
        Self {
            show_balloons: true,
            show_kicks: true,
            show_subscriptions: true,
            show_follows: true,
            show_mission: true,
            show_mission_settle: true,
        }
    }
}

impl VisibilityRules {
    /// Returns `true` if an event of `kind` should be kept in the history.
    ///
    /// Presence, manager and kick-display events are control-plane only and
    /// are never kept.  Subscription notices follow `show_subscriptions`.
    pub fn retains(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::UserJoin
            | EventKind::UserExit
            | EventKind::ManagerSet
            | EventKind::KickDisplayToggle => false,
            EventKind::Kick => self.show_kicks,
            EventKind::Follow => self.show_subscriptions,
            EventKind::Message
            | EventKind::Mute
            | EventKind::FreezeMode
            | EventKind::SlowMode
            | EventKind::Notice
            | EventKind::Sticker => true,
        }
    }
}

// ── Retention buffer ──────────────────────────────────────────────────────────

/// Arrival-ordered event history capped at `threshold` entries.
///
/// When the cap is exceeded the oldest entries are dropped (FIFO); the
/// relative order of the survivors never changes.
#[derive(Debug, Clone)]
pub struct RetentionBuffer {
    items: VecDeque<ChatEvent>,
    threshold: usize,
}

impl RetentionBuffer {
    /// Creates an empty buffer holding at most `threshold` events.
    pub fn new(threshold: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(threshold.min(1024)),
            threshold,
        }
    }

    /// Appends `event`, evicting from the front if the cap is exceeded.
    pub fn push(&mut self, event: ChatEvent) {
        self.items.push_back(event);
        self.prune();
    }

    /// Drops the oldest `len - threshold` events; returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let excess = self.items.len().saturating_sub(self.threshold);
        if excess > 0 {
            self.items.drain(..excess);
        }
        excess
    }

    /// Changes the cap and immediately trims to it.
    pub fn set_threshold(&mut self, threshold: usize) -> usize {
        self.threshold = threshold;
        self.prune()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ChatEvent> {
        self.items.iter()
    }

    /// Copies the history, oldest first.
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.items.iter().cloned().collect()
    }
}

impl Default for RetentionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_THRESHOLD)
    }
}

// ── Event store ───────────────────────────────────────────────────────────────

/// Result of [`EventStore::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub event: ChatEvent,
    /// Whether the event was appended to the history.
    pub retained: bool,
}

/// Stamps, filters and records accepted events.
#[derive(Debug)]
pub struct EventStore {
    sequence: SequenceCounter,
    rules: VisibilityRules,
    buffer: RetentionBuffer,
}

impl EventStore {
    pub fn new(threshold: usize, rules: VisibilityRules) -> Self {
        Self {
            sequence: SequenceCounter::new(),
            rules,
            buffer: RetentionBuffer::new(threshold),
        }
    }

    /// Accepts `payload` stamped with the current wall-clock time.
    pub fn submit(&mut self, payload: EventPayload) -> Submission {
        self.submit_at(payload, now_ms())
    }

    /// Accepts `payload` stamped with `timestamp_ms`.
    pub fn submit_at(&mut self, payload: EventPayload, timestamp_ms: u64) -> Submission {
        let event = ChatEvent {
            index: self.sequence.next(),
            timestamp_ms,
            payload,
        };

        if let EventPayload::KickDisplayToggle { visible } = event.payload {
            debug!("kick display toggled: {visible}");
            self.rules.show_kicks = visible;
        }

        let retained = self.rules.retains(event.kind());
        if retained {
            self.buffer.push(event.clone());
        }

        Submission { event, retained }
    }

    /// Trims the history to its threshold; returns how many events were dropped.
    pub fn prune(&mut self) -> usize {
        self.buffer.prune()
    }

    pub fn rules(&self) -> &VisibilityRules {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: VisibilityRules) {
        self.rules = rules;
    }

    pub fn set_threshold(&mut self, threshold: usize) -> usize {
        self.buffer.set_threshold(threshold)
    }

    pub fn buffer(&self) -> &RetentionBuffer {
        &self.buffer
    }

    /// Index the next accepted event will receive.
    pub fn next_index(&self) -> u64 {
        self.sequence.current()
    }

    #[cfg(test)]
    fn with_sequence(mut self, sequence: SequenceCounter) -> Self {
        self.sequence = sequence;
        self
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_THRESHOLD, VisibilityRules::default())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
