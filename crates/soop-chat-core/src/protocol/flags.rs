//! Decoding of bit-packed flag words.
//!
//! # What is a flag word? (for beginners)
//!
//! Several chat fields pack up to 32 independent yes/no facts about a user
//! (is this the broadcaster? a manager? a fan-club member?) into a single
//! integer, one fact per bit.  On the wire the integer is written as a decimal
//! string such as `"5"`.
//!
//! Decoding works least-significant-bit first: `"5"` is binary `101`, so bit 0
//! and bit 2 are set.  Each protocol version fixes which bit means what; bits
//! that are not in the mapping are ignored.
//!
//! A flag word that is not a valid unsigned decimal integer is an error.  It
//! is never silently treated as "all clear", because an all-clear word is a
//! legitimate value that callers must be able to tell apart from garbage.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::protocol::codec::ProtocolError;

/// Named booleans produced by [`decode_flags`], keyed by flag name.
pub type FlagMap = BTreeMap<&'static str, bool>;

/// Decodes the decimal flag word `raw` into named booleans.
///
/// The value is rendered as a binary string zero-padded to `width` digits and
/// reversed, so that index 0 is the least-significant bit.  For every
/// `(bit_index, name)` pair in `mapping` the result holds
/// `name = (digit at bit_index == '1')`.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidFlagWord`] if `raw` is not an unsigned
/// decimal integer that fits in 64 bits.
///
/// # Examples
///
/// ```rust
/// use soop_chat_core::protocol::flags::decode_flags;
///
/// let flags = decode_flags("5", 32, &[(0, "ADMIN"), (1, "HIDDEN"), (2, "BJ")]).unwrap();
/// assert_eq!(flags["ADMIN"], true);
/// assert_eq!(flags["HIDDEN"], false);
/// assert_eq!(flags["BJ"], true);
/// ```
pub fn decode_flags(
    raw: &str,
    width: usize,
    mapping: &[(usize, &'static str)],
) -> Result<FlagMap, ProtocolError> {
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidFlagWord(raw.to_string()))?;

    let mut digits = format!("{value:0width$b}").into_bytes();
    digits.reverse();

    Ok(mapping
        .iter()
        .map(|&(bit, name)| (name, digits.get(bit) == Some(&b'1')))
        .collect())
}

/// Declares a fixed-width flag record with one `bool` field per mapped bit.
macro_rules! flag_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident(width = $width:expr) {
            $( $bit:literal => $field:ident as $label:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
        pub struct $name {
            $(
                #[serde(rename = $label)]
                pub $field: bool,
            )*
        }

        impl $name {
            /// Declared width of the flag word in bits.
            pub const WIDTH: usize = $width;

            /// Bit-to-name mapping, least-significant bit first.
            pub const MAPPING: &'static [(usize, &'static str)] = &[$(($bit, $label),)*];

            /// Decodes a decimal flag word.
            ///
            /// # Errors
            ///
            /// Returns [`ProtocolError::InvalidFlagWord`] for non-numeric input.
            pub fn from_decimal(raw: &str) -> Result<Self, ProtocolError> {
                let map = decode_flags(raw, Self::WIDTH, Self::MAPPING)?;
                Ok(Self {
                    $( $field: map.get($label).copied().unwrap_or(false), )*
                })
            }

            /// Re-encodes the set flags into their bit positions.
            pub fn to_bits(&self) -> u64 {
                let mut bits = 0u64;
                $( if self.$field { bits |= 1u64 << $bit; } )*
                bits
            }

            /// Looks a flag up by its protocol name.
            pub fn get(&self, label: &str) -> Option<bool> {
                match label {
                    $( $label => Some(self.$field), )*
                    _ => None,
                }
            }
        }
    };
}

flag_record! {
    /// Per-user role and client flags (first half of a `"user|status"` pair).
    pub struct UserFlags(width = 32) {
        0 => admin as "ADMIN",
        1 => hidden as "HIDDEN",
        2 => bj as "BJ",
        3 => dumb as "DUMB",
        4 => guest as "GUEST",
        5 => fanclub as "FANCLUB",
        6 => auto_manager as "AUTOMANAGER",
        7 => manager_list as "MANAGERLIST",
        8 => manager as "MANAGER",
        9 => female as "FEMALE",
        10 => auto_dumb as "AUTODUMB",
        11 => dumb_blind as "DUMB_BLIND",
        12 => dobae_blind as "DOBAE_BLIND",
        13 => exit_user as "EXITUSER",
        14 => mobile as "MOBILE",
        15 => topfan as "TOPFAN",
        16 => realname as "REALNAME",
        17 => no_direct as "NODIRECT",
        18 => global_app as "GLOBAL_APP",
        19 => quickview as "QUICKVIEW",
        20 => sptr_sticker as "SPTR_STICKER",
        21 => chromecast as "CHROMECAST",
        24 => dobae_blind2 as "DOBAE_BLIND2",
        28 => follower as "FOLLOWER",
        30 => noti_vod_balloon as "NOTIVODBALOON",
        31 => noti_topfan as "NOTITOPFAN",
    }
}

flag_record! {
    /// Per-user status flags (second half of a `"user|status"` pair).
    pub struct StatusFlags(width = 32) {
        0 => global_pc as "GLOBAL_PC",
        1 => clan as "CLAN",
        2 => top_clan as "TOPCLAN",
        3 => top20 as "TOP20",
        4 => game_god as "GAMEGOD",
        5 => game_imo as "GAMEIMO",
        6 => no_superchat as "NOSUPERCHAT",
        7 => no_recv_chat as "NORECVCHAT",
        8 => flash as "FLASH",
        9 => lg_game as "LGGAME",
        10 => employee as "EMPLOYEE",
        11 => clean_ati as "CLEANATI",
        12 => police as "POLICE",
        13 => admin_chat as "ADMINCHAT",
        14 => pc as "PC",
        15 => specify as "SPECIFY",
        16 => new_studio as "NEW_STUDIO",
        17 => html5 as "HTML5",
    }
}

flag_record! {
    /// Which audiences may still chat while the room is frozen.
    pub struct FreezeFlags(width = 16) {
        4 => streamer as "streamer",
        5 => fanclub as "fanclub",
        6 => supporter as "supporter",
        7 => topfan as "topfan",
        8 => subscriber as "subscriber",
        9 => manager as "manager",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
