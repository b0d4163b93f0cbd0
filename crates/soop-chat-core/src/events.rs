//! Typed chat events.
//!
//! Each inbound opcode that carries user-visible information is decoded into
//! one [`EventPayload`] variant.  A variant holds only the fields relevant to
//! its category, so impossible combinations (a slow-mode change with a
//! nickname, a kick with a freeze bitmap) cannot be represented.
//!
//! Numeric fields are `Option`s: upstream occasionally sends frames with
//! missing or non-numeric sub-fields, and such a field decodes to `None`
//! rather than failing the whole frame.

use serde::Serialize;

use crate::protocol::flags::{FreezeFlags, StatusFlags, UserFlags};

/// Category tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    UserJoin,
    UserExit,
    Mute,
    ManagerSet,
    FreezeMode,
    SlowMode,
    Kick,
    KickDisplayToggle,
    Notice,
    Follow,
    Sticker,
}

/// The `"user|status"` flag pair attached to user-originated events.
///
/// Either half is `None` when it was missing or failed to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserBadges {
    pub user: Option<UserFlags>,
    pub status: Option<StatusFlags>,
}

/// Variant-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A chat message from a viewer.
    Message {
        user_id: String,
        nickname: String,
        text: String,
        /// Months subscribed; `None` when absent or non-numeric.
        sub_months: Option<u32>,
        badges: UserBadges,
    },
    /// A user entered the room.
    UserJoin {
        user_id: String,
        nickname: String,
        badges: UserBadges,
    },
    /// A user left the room.
    UserExit {
        user_id: String,
        nickname: String,
        badges: UserBadges,
    },
    /// A user was muted.
    Mute {
        user_id: String,
        /// Accumulated mute count (three leads to a blind).
        level: Option<i64>,
        /// Mute duration in seconds.
        duration: Option<i64>,
        badges: UserBadges,
    },
    /// A user's manager rights changed.
    ManagerSet { user_id: String, badges: UserBadges },
    /// Chat freeze was switched on or off.
    FreezeMode {
        enabled: bool,
        level: Option<i64>,
        /// Audiences still allowed to chat; `None` when the bitmap is invalid.
        allowed: Option<FreezeFlags>,
        /// Minimum fan-club balloon count still allowed to chat.
        balloon_threshold: Option<i64>,
    },
    /// Slow-mode interval changed.
    SlowMode { interval: Option<i64> },
    /// A user was kicked.
    Kick { user_id: String, nickname: String },
    /// Kick notices were switched on or off for this room.
    KickDisplayToggle { visible: bool },
    /// Broadcaster notice.
    Notice { text: String },
    /// A user subscribed.
    Follow {
        user_id: String,
        nickname: String,
        sub_months: Option<u32>,
    },
    /// A sticker (OGQ emoticon) was sent.
    Sticker {
        sticker_id: String,
        index: Option<i64>,
        version: Option<i64>,
        format: String,
        user_id: String,
        nickname: String,
        badges: UserBadges,
    },
}

impl EventPayload {
    /// Returns the category tag for this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Message { .. } => EventKind::Message,
            EventPayload::UserJoin { .. } => EventKind::UserJoin,
            EventPayload::UserExit { .. } => EventKind::UserExit,
            EventPayload::Mute { .. } => EventKind::Mute,
            EventPayload::ManagerSet { .. } => EventKind::ManagerSet,
            EventPayload::FreezeMode { .. } => EventKind::FreezeMode,
            EventPayload::SlowMode { .. } => EventKind::SlowMode,
            EventPayload::Kick { .. } => EventKind::Kick,
            EventPayload::KickDisplayToggle { .. } => EventKind::KickDisplayToggle,
            EventPayload::Notice { .. } => EventKind::Notice,
            EventPayload::Follow { .. } => EventKind::Follow,
            EventPayload::Sticker { .. } => EventKind::Sticker,
        }
    }
}

/// An accepted event: a payload stamped with its sequence index and time.
///
/// Events are immutable once constructed by the [`crate::EventStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    /// Monotonic sequence index (wraps to 0 past `2^53 - 1`).
    pub index: u64,
    /// Milliseconds since the Unix epoch at acceptance time.
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl ChatEvent {
    /// Category tag of the payload.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let payload = EventPayload::SlowMode { interval: Some(3) };
        assert_eq!(payload.kind(), EventKind::SlowMode);

        let payload = EventPayload::KickDisplayToggle { visible: false };
        assert_eq!(payload.kind(), EventKind::KickDisplayToggle);
    }

    #[test]
    fn test_event_serializes_flat_with_kind_tag() {
        // Arrange
        let event = ChatEvent {
            index: 7,
            timestamp_ms: 1_700_000_000_000,
            payload: EventPayload::Notice {
                text: "hello".to_string(),
            },
        };

        // Act
        let json = serde_json::to_value(&event).unwrap();

        // Assert
        assert_eq!(json["index"], 7);
        assert_eq!(json["kind"], "notice");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn test_missing_numeric_serializes_as_null() {
        let json = serde_json::to_value(EventPayload::SlowMode { interval: None }).unwrap();
        assert!(json["interval"].is_null());
    }
}
