//! Protocol module containing the frame codec, opcode table, flag decoder and
//! sequence counter.

pub mod codec;
pub mod flags;
pub mod opcodes;
pub mod sequence;

pub use codec::{decode_frame, Frame, ProtocolError};
pub use flags::{decode_flags, FlagMap, FreezeFlags, StatusFlags, UserFlags};
pub use opcodes::Opcode;
pub use sequence::SequenceCounter;
