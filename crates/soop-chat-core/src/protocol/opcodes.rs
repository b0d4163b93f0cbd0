//! Opcode table for the chat protocol.
//!
//! Every frame carries a 4-digit decimal opcode right after the control
//! prefix.  Only some opcodes produce chat events; the rest are recognised so
//! they can be logged by name instead of being reported as unknown.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::protocol::codec::ProtocolError;

/// All opcodes this client recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum Opcode {
    /// Keepalive (sent by the client only).
    KeepAlive = 0,
    /// Session-init acknowledgement.
    Login = 1,
    /// Room-join acknowledgement.
    JoinChannel = 2,
    /// A user entered or left the room.
    ChannelUser = 4,
    /// Chat message.
    Chat = 5,
    /// A user was muted.
    SetDumb = 8,
    SetUserFlag = 12,
    /// A user was granted or lost manager rights.
    ManagerToggle = 13,
    SendBalloon = 18,
    /// Observed upstream with no known meaning.
    Unlabeled19 = 19,
    /// Extended freeze ("ice") mode change.
    IceModeEx = 21,
    /// Slow-mode interval change.
    SlowMode = 23,
    ManagerChat = 26,
    Blacklist = 52,
    BanWord = 54,
    /// A user was kicked.
    Kick = 76,
    /// The broadcast ended; the client closes the transport.
    CloseBroadcast = 88,
    /// Whether kick notices should be displayed.
    DisplayKick = 90,
    /// Subscription (follow item) notice.
    FollowItem = 93,
    TranslationState = 94,
    /// Broadcaster notice.
    BjNotice = 104,
    SendSubscription = 108,
    /// Sticker (OGQ emoticon) message.
    OgqEmoticon = 109,
    ItemDrops = 111,
    Mission = 121,
    MissionSettle = 125,
    /// Observed upstream with no known meaning.
    Unlabeled127 = 127,
}

impl Opcode {
    /// Numeric value of the opcode.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for Opcode {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0 => Ok(Opcode::KeepAlive),
            1 => Ok(Opcode::Login),
            2 => Ok(Opcode::JoinChannel),
            4 => Ok(Opcode::ChannelUser),
            5 => Ok(Opcode::Chat),
            8 => Ok(Opcode::SetDumb),
            12 => Ok(Opcode::SetUserFlag),
            13 => Ok(Opcode::ManagerToggle),
            18 => Ok(Opcode::SendBalloon),
            19 => Ok(Opcode::Unlabeled19),
            21 => Ok(Opcode::IceModeEx),
            23 => Ok(Opcode::SlowMode),
            26 => Ok(Opcode::ManagerChat),
            52 => Ok(Opcode::Blacklist),
            54 => Ok(Opcode::BanWord),
            76 => Ok(Opcode::Kick),
            88 => Ok(Opcode::CloseBroadcast),
            90 => Ok(Opcode::DisplayKick),
            93 => Ok(Opcode::FollowItem),
            94 => Ok(Opcode::TranslationState),
            104 => Ok(Opcode::BjNotice),
            108 => Ok(Opcode::SendSubscription),
            109 => Ok(Opcode::OgqEmoticon),
            111 => Ok(Opcode::ItemDrops),
            121 => Ok(Opcode::Mission),
            125 => Ok(Opcode::MissionSettle),
            127 => Ok(Opcode::Unlabeled127),
            _ => Err(()),
        }
    }
}

impl FromStr for Opcode {
    type Err = ProtocolError;

    /// Parses the 4-digit opcode slice of a frame.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::UnknownOpcode(s.to_string()));
        }
        s.parse::<u16>()
            .ok()
            .and_then(|code| Opcode::try_from(code).ok())
            .ok_or_else(|| ProtocolError::UnknownOpcode(s.to_string()))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.code())
    }
}
