//! Per-opcode field schemas.
//!
//! An inbound frame is a positional field list (see
//! [`soop_chat_core::protocol::codec::Frame`]).  Each sub-module below names
//! the field positions used by one opcode, and [`decode_event`] turns a frame
//! into the matching [`EventPayload`] variant.
//!
//! Decoding is lenient:
//!
//! - a missing text field decodes to `""`,
//! - a missing or non-numeric numeric field decodes to `None`,
//! - a flag word that fails to decode is carried as `None` and logged.
//!
//! A single malformed frame therefore never fails the session.

use std::str::FromStr;

use soop_chat_core::events::{EventPayload, UserBadges};
use soop_chat_core::protocol::codec::Frame;
use soop_chat_core::protocol::flags::{FreezeFlags, StatusFlags, UserFlags};
use soop_chat_core::protocol::opcodes::Opcode;
use tracing::warn;

/// Opcode `0004`: a user entered or left the room.
pub mod channel_user {
    /// `"1"` means the user joined; anything else means the user left.
    pub const ACTION: usize = 1;
    pub const USER_ID: usize = 2;
    pub const NICKNAME: usize = 3;
    pub const FLAGS: usize = 5;
}

/// Opcode `0005`: chat message.
pub mod chat {
    pub const TEXT: usize = 1;
    pub const USER_ID: usize = 2;
    pub const NICKNAME: usize = 6;
    pub const FLAGS: usize = 7;
    pub const SUB_MONTHS: usize = 8;
}

/// Opcode `0008`: mute.
pub mod mute {
    pub const USER_ID: usize = 1;
    pub const FLAGS: usize = 2;
    pub const DURATION: usize = 3;
    pub const LEVEL: usize = 4;
}

/// Opcode `0013`: manager rights changed.
pub mod manager {
    pub const USER_ID: usize = 1;
    pub const FLAGS: usize = 2;
}

/// Opcode `0021`: freeze mode.
pub mod freeze {
    /// `"1"` means freeze was switched on.
    pub const ENABLED: usize = 1;
    pub const LEVEL: usize = 2;
    pub const ALLOWED: usize = 3;
    pub const BALLOON_THRESHOLD: usize = 4;
}

/// Opcode `0023`: slow mode.
pub mod slow_mode {
    pub const INTERVAL: usize = 2;
}

/// Opcode `0076`: kick.
pub mod kick {
    pub const USER_ID: usize = 1;
    pub const NICKNAME: usize = 2;
}

/// Opcode `0090`: kick-notice display toggle.
pub mod kick_display {
    /// `"1"` means kick notices are shown.
    pub const VISIBLE: usize = 2;
}

/// Opcode `0104`: broadcaster notice.
pub mod notice {
    pub const TEXT: usize = 4;
}

/// Opcode `0093`: subscription notice.  Index 1 carries the broadcaster id,
/// which the event does not keep.
pub mod follow {
    pub const USER_ID: usize = 2;
    pub const NICKNAME: usize = 3;
    pub const SUB_MONTHS: usize = 4;
}

/// Opcode `0109`: sticker (OGQ emoticon).
pub mod sticker {
    pub const STICKER_ID: usize = 3;
    pub const INDEX: usize = 4;
    pub const VERSION: usize = 5;
    pub const USER_ID: usize = 6;
    pub const NICKNAME: usize = 7;
    pub const FLAGS: usize = 8;
    pub const FORMAT: usize = 9;
}

/// Decodes `frame` into an event payload.
///
/// Returns `None` for opcodes that do not produce events (handshake,
/// broadcast-closed and the logged-only opcodes).
pub fn decode_event(opcode: Opcode, frame: &Frame) -> Option<EventPayload> {
    let payload = match opcode {
        Opcode::ChannelUser => {
            let user_id = text(frame, channel_user::USER_ID);
            let nickname = text(frame, channel_user::NICKNAME);
            let badges = badges(frame, channel_user::FLAGS);
            if frame.field(channel_user::ACTION) == Some("1") {
                EventPayload::UserJoin {
                    user_id,
                    nickname,
                    badges,
                }
            } else {
                EventPayload::UserExit {
                    user_id,
                    nickname,
                    badges,
                }
            }
        }
        Opcode::Chat => EventPayload::Message {
            user_id: text(frame, chat::USER_ID),
            nickname: text(frame, chat::NICKNAME),
            text: text(frame, chat::TEXT),
            sub_months: number(frame, chat::SUB_MONTHS),
            badges: badges(frame, chat::FLAGS),
        },
        Opcode::SetDumb => EventPayload::Mute {
            user_id: text(frame, mute::USER_ID),
            level: number(frame, mute::LEVEL),
            duration: number(frame, mute::DURATION),
            badges: badges(frame, mute::FLAGS),
        },
        Opcode::ManagerToggle => EventPayload::ManagerSet {
            user_id: text(frame, manager::USER_ID),
            badges: badges(frame, manager::FLAGS),
        },
        Opcode::IceModeEx => EventPayload::FreezeMode {
            enabled: frame.field(freeze::ENABLED) == Some("1"),
            level: number(frame, freeze::LEVEL),
            allowed: frame
                .field(freeze::ALLOWED)
                .and_then(|raw| flag_word(raw, FreezeFlags::from_decimal)),
            balloon_threshold: number(frame, freeze::BALLOON_THRESHOLD),
        },
        Opcode::SlowMode => EventPayload::SlowMode {
            interval: number(frame, slow_mode::INTERVAL),
        },
        Opcode::Kick => EventPayload::Kick {
            user_id: text(frame, kick::USER_ID),
            nickname: text(frame, kick::NICKNAME),
        },
        Opcode::DisplayKick => EventPayload::KickDisplayToggle {
            visible: frame.field(kick_display::VISIBLE) == Some("1"),
        },
        Opcode::BjNotice => EventPayload::Notice {
            text: text(frame, notice::TEXT),
        },
        Opcode::FollowItem => EventPayload::Follow {
            user_id: text(frame, follow::USER_ID),
            nickname: text(frame, follow::NICKNAME),
            sub_months: number(frame, follow::SUB_MONTHS),
        },
        Opcode::OgqEmoticon => EventPayload::Sticker {
            sticker_id: text(frame, sticker::STICKER_ID),
            index: number(frame, sticker::INDEX),
            version: number(frame, sticker::VERSION),
            format: text(frame, sticker::FORMAT),
            user_id: text(frame, sticker::USER_ID),
            nickname: text(frame, sticker::NICKNAME),
            badges: badges(frame, sticker::FLAGS),
        },
        _ => return None,
    };
    Some(payload)
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn text(frame: &Frame, index: usize) -> String {
    frame.field(index).unwrap_or_default().to_string()
}

fn number<T: FromStr>(frame: &Frame, index: usize) -> Option<T> {
    frame.field(index)?.trim().parse().ok()
}

/// Decodes a `"user|status"` flag pair.
fn badges(frame: &Frame, index: usize) -> UserBadges {
    let Some(raw) = frame.field(index) else {
        return UserBadges::default();
    };
    let (user, status) = match raw.split_once('|') {
        Some((user, status)) => (user, Some(status)),
        None => (raw, None),
    };
    UserBadges {
        user: flag_word(user, UserFlags::from_decimal),
        status: status.and_then(|s| flag_word(s, StatusFlags::from_decimal)),
    }
}

/// Decodes one flag word; an empty word is simply absent.
fn flag_word<T, E: std::fmt::Display>(
    raw: &str,
    decode: impl FnOnce(&str) -> Result<T, E>,
) -> Option<T> {
    if raw.trim().is_empty() {
        return None;
    }
    match decode(raw) {
        Ok(flags) => Some(flags),
        Err(e) => {
            warn!("dropping undecodable flag word: {e}");
            None
        }
    }
}
