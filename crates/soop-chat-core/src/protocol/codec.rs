//! Text codec for building and splitting chat protocol frames.
//!
//! Wire format:
//! ```text
//! [ESC][TAB][opcode:4][length:6][reserved:2][FF][field][FF][field]...[FF]
//! ```
//! All header values are zero-padded ASCII decimal digits.  `FF` is the
//! form-feed character (`0x0C`), which separates every field of the frame.
//!
//! The length field counts the UTF-8 *bytes* of the variable payload plus a
//! fixed per-packet offset.  Counting characters instead would produce a
//! short length for any multi-byte (e.g. Korean) text.

use thiserror::Error;

/// Escape character that opens every frame.
pub const ESC: char = '\u{1b}';

/// Horizontal tab that follows [`ESC`] in the control prefix.
pub const TAB: char = '\t';

/// Field separator (form feed, `0x0C`).
pub const FIELD_SEPARATOR: char = '\u{0c}';

/// The two control characters preceding the opcode.
pub const CONTROL_PREFIX: &str = "\u{1b}\t";

/// Keepalive frame resent on a fixed period once the room is joined.
pub const KEEPALIVE_FRAME: &str = "\u{1b}\t000000000100\u{0c}";

/// Protocol sub-version announced in the session-init trailer.
pub const PROTOCOL_SUB_VERSION: &str = "16";

/// Byte offset of the opcode inside a raw frame (after the control prefix).
const OPCODE_RANGE: std::ops::Range<usize> = 2..6;

/// Length-field offsets added to each packet's payload byte length.
const INIT_LENGTH_OFFSET: usize = 6;
const JOIN_LENGTH_OFFSET: usize = 6;
const CHAT_LENGTH_OFFSET: usize = 4;

/// Errors that can occur while decoding inbound frames or flag words.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is too short to contain the control prefix and opcode.
    #[error("truncated frame: need at least {needed} bytes, got {available}")]
    TruncatedFrame { needed: usize, available: usize },

    /// The opcode bytes after the control prefix are not ASCII digits on
    /// character boundaries.
    #[error("malformed frame header: {0:?}")]
    MalformedHeader(String),

    /// A flag word was not an unsigned decimal integer.
    #[error("invalid flag word: {0:?}")]
    InvalidFlagWord(String),

    /// The opcode is not one this client knows about.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
}

// ── Inbound frames ────────────────────────────────────────────────────────────

/// One inbound frame split into its opcode and positional fields.
///
/// Field positions are the positions produced by splitting the raw frame on
/// [`FIELD_SEPARATOR`].  Slot 0 is the header slot: its text (control prefix,
/// opcode, length and reserved digits) is kept in [`Frame::header`] and the
/// slot itself is left empty, so payload fields start at index 1 and the
/// field count always equals the number of separators plus one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    opcode: String,
    header: String,
    fields: Vec<String>,
}

impl Frame {
    /// The 4-digit opcode, e.g. `"0005"`.
    pub fn opcode(&self) -> &str {
        &self.opcode
    }

    /// Raw header text preceding the first separator.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// All positional fields; index 0 is the (empty) header slot.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the field at `index`, or `None` when the frame is too short.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Splits a raw inbound frame into its opcode and ordered field list.
///
/// The split is always performed on the original text; see
/// [`render_for_log`] for the human-readable form used in log lines.
///
/// # Errors
///
/// Returns [`ProtocolError::TruncatedFrame`] if the frame is shorter than the
/// control prefix plus opcode, and [`ProtocolError::MalformedHeader`] if the
/// opcode bytes split a multi-byte character.
///
/// # Examples
///
/// ```rust
/// use soop_chat_core::protocol::codec::decode_frame;
///
/// let frame = decode_frame("\u{1b}\t0002000013\u{0c}12345\u{0c}\u{0c}\u{0c}\u{0c}\u{0c}").unwrap();
/// assert_eq!(frame.opcode(), "0002");
/// assert_eq!(frame.field(1), Some("12345"));
/// ```
pub fn decode_frame(text: &str) -> Result<Frame, ProtocolError> {
    if text.len() < OPCODE_RANGE.end {
        return Err(ProtocolError::TruncatedFrame {
            needed: OPCODE_RANGE.end,
            available: text.len(),
        });
    }
    let opcode = text
        .get(OPCODE_RANGE)
        .ok_or_else(|| ProtocolError::MalformedHeader(text.chars().take(6).collect()))?
        .to_string();

    let mut parts = text.split(FIELD_SEPARATOR);
    // `split` always yields at least one item, even for an empty string.
    let header = parts.next().unwrap_or_default().to_string();

    let mut fields = Vec::with_capacity(8);
    fields.push(String::new());
    fields.extend(parts.map(str::to_string));

    Ok(Frame {
        opcode,
        header,
        fields,
    })
}

/// Renders a raw frame for log output, making field separators visible.
///
/// This is a display-only transformation.  The result must never be fed back
/// into [`decode_frame`]: a field containing the text `" FF "` would become
/// indistinguishable from a real separator.
pub fn render_for_log(text: &str) -> String {
    text.replace(FIELD_SEPARATOR, " FF ")
        .replace(ESC, "ESC ")
        .replace(TAB, "TAB ")
}

// ── Outbound packets ──────────────────────────────────────────────────────────

/// Builds the header for an outbound packet.
fn header(opcode: &str, length: usize) -> String {
    format!("{CONTROL_PREFIX}{opcode}{length:06}00")
}

/// Builds the session-init packet (opcode `0001`).
///
/// The cookie is the opaque session cookie supplied by the authentication
/// layer.  An absent or empty cookie produces an anonymous init packet.
///
/// # Examples
///
/// ```rust
/// use soop_chat_core::protocol::codec::encode_init;
///
/// assert_eq!(encode_init(None), "\u{1b}\t000100000600\u{0c}\u{0c}\u{0c}16\u{0c}");
/// ```
pub fn encode_init(cookie: Option<&str>) -> String {
    let cookie = cookie.unwrap_or_default();
    let mut packet = header("0001", cookie.len() + INIT_LENGTH_OFFSET);
    packet.push(FIELD_SEPARATOR);
    packet.push_str(cookie);
    packet.push(FIELD_SEPARATOR);
    packet.push(FIELD_SEPARATOR);
    packet.push_str(PROTOCOL_SUB_VERSION);
    packet.push(FIELD_SEPARATOR);
    packet
}

/// Builds the room-join packet (opcode `0002`) for `room_id`.
pub fn encode_join(room_id: &str) -> String {
    let mut packet = header("0002", room_id.len() + JOIN_LENGTH_OFFSET);
    packet.push(FIELD_SEPARATOR);
    packet.push_str(room_id);
    for _ in 0..5 {
        packet.push(FIELD_SEPARATOR);
    }
    packet
}

/// Builds the chat-send packet (opcode `0005`) carrying `message`.
pub fn encode_chat(message: &str) -> String {
    let mut packet = header("0005", message.len() + CHAT_LENGTH_OFFSET);
    packet.push(FIELD_SEPARATOR);
    packet.push_str(message);
    packet.push(FIELD_SEPARATOR);
    packet
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FF: &str = "\u{0c}";

    #[test]
    fn test_decode_join_ack_preserves_field_count() {
        // Arrange
        let raw = format!("\u{1b}\t0002000013{FF}12345{}", FF.repeat(5));

        // Act
        let frame = decode_frame(&raw).unwrap();

        // Assert
        assert_eq!(frame.opcode(), "0002");
        assert_eq!(frame.fields(), ["", "12345", "", "", "", "", ""]);
        assert_eq!(frame.header(), "\u{1b}\t0002000013");
    }

    #[test]
    fn test_decode_frame_without_separator_has_only_header_slot() {
        let frame = decode_frame("\u{1b}\t000000000100").unwrap();
        assert_eq!(frame.opcode(), "0000");
        assert_eq!(frame.fields().len(), 1);
    }

    #[test]
    fn test_decode_short_frame_returns_truncated() {
        let result = decode_frame("\u{1b}\t00");
        assert_eq!(
            result,
            Err(ProtocolError::TruncatedFrame {
                needed: 6,
                available: 4
            })
        );
    }

    #[test]
    fn test_decode_multibyte_in_opcode_position_returns_malformed_header() {
        // "한" is 3 bytes, so bytes 2..6 do not fall on character boundaries.
        let result = decode_frame("\u{1b}한글");
        assert_eq!(
            result,
            Err(ProtocolError::MalformedHeader("\u{1b}한글".to_string()))
        );
    }

    #[test]
    fn test_field_out_of_range_is_none() {
        let frame = decode_frame(&format!("\u{1b}\t000500000000{FF}hi{FF}")).unwrap();
        assert_eq!(frame.field(1), Some("hi"));
        assert_eq!(frame.field(2), Some(""));
        assert_eq!(frame.field(3), None);
    }

    #[test]
    fn test_log_rendering_does_not_affect_split() {
        // Arrange – a field that contains the text the log rendering would produce
        let raw = format!("\u{1b}\t000500000000{FF}a FF b{FF}nick{FF}");

        // Act
        let frame = decode_frame(&raw).unwrap();
        let rendered = render_for_log(&raw);

        // Assert
        assert_eq!(frame.field(1), Some("a FF b"));
        assert_eq!(frame.field(2), Some("nick"));
        assert!(rendered.contains(" FF nick FF "));
        assert!(!rendered.contains(FF));
    }

    #[test]
    fn test_encode_init_with_cookie() {
        let packet = encode_init(Some("abc"));
        assert_eq!(packet, format!("\u{1b}\t000100000900{FF}abc{FF}{FF}16{FF}"));
    }

    #[test]
    fn test_encode_init_with_empty_cookie_matches_anonymous() {
        assert_eq!(encode_init(Some("")), encode_init(None));
    }

    #[test]
    fn test_encode_join_has_five_trailing_separators() {
        let packet = encode_join("12345");
        assert_eq!(packet, format!("\u{1b}\t000200001100{FF}12345{}", FF.repeat(5)));
    }

    #[test]
    fn test_encode_chat_uses_byte_length() {
        // Arrange – "안녕" is 2 characters but 6 UTF-8 bytes
        let message = "안녕";

        // Act
        let packet = encode_chat(message);

        // Assert – 6 bytes + offset 4 = 10
        assert_eq!(packet, format!("\u{1b}\t000500001000{FF}안녕{FF}"));
    }

    #[test]
    fn test_encoded_packets_decode_to_their_opcode() {
        for (packet, opcode) in [
            (encode_init(Some("c")), "0001"),
            (encode_join("1"), "0002"),
            (encode_chat("m"), "0005"),
            (KEEPALIVE_FRAME.to_string(), "0000"),
        ] {
            assert_eq!(decode_frame(&packet).unwrap().opcode(), opcode);
        }
    }
}
