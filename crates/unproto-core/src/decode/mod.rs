//! Schemaless message decoding.
//!
//! [`Decoder`] walks a buffer field by field and builds a [`Message`]. Scalar
//! wire types map directly onto [`Value`] variants. Length-delimited payloads
//! carry no type information on the wire, so they are interpreted
//! heuristically:
//!
//! 1. as a nested message, if the whole payload parses as fields and is
//!    consumed exactly,
//! 2. as a string, if it is valid UTF-8,
//! 3. as raw bytes otherwise.
//!
//! ## Bounds
//!
//! A nested attempt runs on a [`Cursor`] carved out of the enclosing range, so
//! no read inside it can reach past the declared payload length, however the
//! payload is corrupted. Failures of such an attempt are local: the payload
//! simply falls through to the next interpretation. Failures anywhere else
//! abort the decode, and there is no partial result.
//!
//! Nesting is limited by [`DecoderConfig::max_depth`]. In a message at the
//! limit, a payload that is well-formed framing would be a message nested too
//! deep, and aborts the decode with [`Error::DepthExceeded`]. Any other payload
//! there is still read as text or bytes.

pub mod value;

use crate::error::{Error, Result};
use crate::wire::{Cursor, WireType};
use bytes::Bytes;
use tracing::{debug, trace};

pub use value::{hex_string, Field, Message, Value};

/// Default limit for nested message depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Order in which length-delimited interpretations are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disambiguation {
    /// Nested message, then UTF-8 text, then bytes
    #[default]
    MessageFirst,
    /// Printable text, then nested message, then UTF-8 text, then bytes.
    ///
    /// Short strings such as `"hi"` are often also well-formed messages
    /// (`0x68 0x69` is field 13 with varint 105). This order keeps text that
    /// contains no control characters other than `\n`, `\r` and `\t` as text.
    PrintableTextFirst,
}

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum nested message depth; the outermost message is depth 0
    pub max_depth: usize,
    /// Interpretation order for length-delimited payloads
    pub disambiguation: Disambiguation,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            disambiguation: Disambiguation::MessageFirst,
        }
    }
}

impl DecoderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nested message depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the interpretation order for length-delimited payloads
    pub fn disambiguation(mut self, order: Disambiguation) -> Self {
        self.disambiguation = order;
        self
    }
}

/// One way of reading a length-delimited payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpretation {
    PrintableText,
    Message,
    Text,
}

const MESSAGE_FIRST: &[Interpretation] = &[Interpretation::Message, Interpretation::Text];

const PRINTABLE_TEXT_FIRST: &[Interpretation] = &[
    Interpretation::PrintableText,
    Interpretation::Message,
    Interpretation::Text,
];

/// Schemaless protobuf decoder
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Returns the decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes a whole buffer as the outermost message.
    ///
    /// The end of the buffer is the only boundary. Any malformed field outside
    /// a length-delimited payload fails the whole decode.
    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        debug!("Decoding {} bytes", data.len());

        let mut cursor = Cursor::new(data);
        let message = self.parse_fields(&mut cursor, 0)?;

        debug!("Decoded message with {} distinct fields", message.len());
        Ok(message)
    }

    /// Decodes exactly `size` bytes from the front of `data` as a message.
    ///
    /// Unlike [`Decoder::decode`], running out of bytes is reported as
    /// [`Error::BoundaryViolation`], as is a field straddling `size`.
    pub fn decode_bounded(&self, data: &[u8], size: usize) -> Result<Message> {
        let range = data.get(..size).ok_or_else(|| {
            Error::boundary_violation(
                0,
                format!("range of {} bytes exceeds {} available", size, data.len()),
            )
        })?;

        let mut cursor = Cursor::bounded(range);
        self.parse_fields(&mut cursor, 0)
    }

    /// Interprets a standalone length-delimited payload
    pub fn interpret(&self, payload: &[u8]) -> Result<Value> {
        self.interpret_range(Cursor::bounded(payload), 0)
    }

    /// Reads fields until the cursor is exhausted.
    ///
    /// `depth` is the nesting depth of the message being parsed.
    fn parse_fields(&self, cursor: &mut Cursor<'_>, depth: usize) -> Result<Message> {
        let mut message = Message::new();

        while !cursor.is_empty() {
            let offset = cursor.offset();
            let tag = cursor.read_tag()?;

            let value = match tag.wire_type {
                WireType::Varint => Value::Varint(cursor.read_varint()?),
                WireType::I64 => Value::Fixed64(cursor.read_fixed64()?),
                WireType::I32 => Value::Fixed32(cursor.read_fixed32()?),
                WireType::Len => {
                    let length = cursor.read_length()?;
                    let payload = cursor.split_to(length)?;
                    self.interpret_range(payload, depth)?
                }
                WireType::StartGroup | WireType::EndGroup => {
                    return Err(Error::InvalidTag {
                        offset,
                        tag: tag.raw(),
                    });
                }
            };

            message.insert(tag.field_number, value);
        }

        Ok(message)
    }

    /// Picks an interpretation for a length-delimited payload found in a
    /// message at `depth`.
    fn interpret_range(&self, payload: Cursor<'_>, depth: usize) -> Result<Value> {
        let order = match self.config.disambiguation {
            Disambiguation::MessageFirst => MESSAGE_FIRST,
            Disambiguation::PrintableTextFirst => PRINTABLE_TEXT_FIRST,
        };

        for &interpretation in order {
            if let Some(value) = self.attempt(interpretation, payload, depth)? {
                return Ok(value);
            }
        }

        Ok(Value::Bytes(Bytes::copy_from_slice(payload.as_slice())))
    }

    /// Tries one interpretation. `Ok(None)` means it does not apply.
    fn attempt(
        &self,
        interpretation: Interpretation,
        payload: Cursor<'_>,
        depth: usize,
    ) -> Result<Option<Value>> {
        let bytes = payload.as_slice();

        match interpretation {
            Interpretation::PrintableText => Ok(std::str::from_utf8(bytes)
                .ok()
                .filter(|s| is_printable(s))
                .map(|s| Value::String(s.to_owned()))),
            Interpretation::Text => Ok(std::str::from_utf8(bytes)
                .ok()
                .map(|s| Value::String(s.to_owned()))),
            Interpretation::Message => {
                if depth >= self.config.max_depth {
                    // An empty payload nests nothing and reads as ""
                    if !payload.is_empty() && is_framing(payload) {
                        return Err(Error::DepthExceeded {
                            offset: payload.offset(),
                            max_depth: self.config.max_depth,
                        });
                    }
                    return Ok(None);
                }

                let mut range = payload;
                match self.parse_fields(&mut range, depth + 1) {
                    Ok(message) => Ok(Some(Value::Message(message))),
                    Err(e) if e.is_recoverable() => {
                        trace!(
                            "Payload of {} bytes at offset {} is not a message: {}",
                            bytes.len(),
                            payload.offset(),
                            e
                        );
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }
}

/// Returns true if the range reads as a flat sequence of fields ending exactly
/// at its end. Length-delimited payloads are skipped, not interpreted.
fn is_framing(mut range: Cursor<'_>) -> bool {
    fn skip_field(range: &mut Cursor<'_>) -> Result<bool> {
        let tag = range.read_tag()?;
        match tag.wire_type {
            WireType::Varint => range.read_varint().map(drop)?,
            WireType::I64 => range.read_fixed64().map(drop)?,
            WireType::I32 => range.read_fixed32().map(drop)?,
            WireType::Len => {
                let length = range.read_length()?;
                range.split_to(length).map(drop)?
            }
            WireType::StartGroup | WireType::EndGroup => return Ok(false),
        }
        Ok(true)
    }

    while !range.is_empty() {
        match skip_field(&mut range) {
            Ok(true) => {}
            Ok(false) | Err(_) => return false,
        }
    }
    true
}

/// Non-empty text without control characters other than common whitespace
fn is_printable(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}

/// Decodes a buffer with the default configuration
pub fn decode(data: &[u8]) -> Result<Message> {
    Decoder::new().decode(data)
}

/// Reads a whole file and decodes it
///
/// This is a convenience function that reads the file and decodes it.
pub fn decode_file(path: impl AsRef<std::path::Path>) -> Result<Message> {
    decode_file_with_config(path, DecoderConfig::default())
}

/// Reads a whole file and decodes it with custom configuration
pub fn decode_file_with_config(
    path: impl AsRef<std::path::Path>,
    config: DecoderConfig,
) -> Result<Message> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::file_read(path, e))?;
    Decoder::with_config(config).decode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
        while value >= 0x80 {
            out.push((value as u8) | 0x80);
            value >>= 7;
        }
        out.push(value as u8);
    }

    fn len_field(field_number: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_varint(u64::from(field_number) << 3 | 2, &mut out);
        encode_varint(payload.len() as u64, &mut out);
        out.extend_from_slice(payload);
        out
    }

    /// `levels` length-delimited wrappers around `{1: 1}`
    fn nested(levels: usize) -> Vec<u8> {
        let mut data = vec![0x08, 0x01];
        for _ in 0..levels {
            data = len_field(1, &data);
        }
        data
    }

    fn printable_first() -> Decoder {
        Decoder::with_config(
            DecoderConfig::new().disambiguation(Disambiguation::PrintableTextFirst),
        )
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode(&[]).unwrap(), Message::new());
    }

    #[test]
    fn test_varint_and_text() {
        let data = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];

        let message = printable_first().decode(&data).unwrap();
        let expected: Message = [(1, Value::Varint(150)), (2, Value::String("hi".into()))]
            .into_iter()
            .collect();
        assert_eq!(message, expected);
        assert_eq!(message.field_numbers(), vec![1, 2]);
    }

    #[test]
    fn test_short_text_that_is_valid_framing() {
        // "hi" is tag 0x68 (field 13, VARINT) followed by varint 105
        let data = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];

        let message = decode(&data).unwrap();
        let inner: Message = [(13, Value::Varint(105))].into_iter().collect();
        assert_eq!(message.get(2), Some(&Field::Single(Value::Message(inner))));
    }

    #[test]
    fn test_text_that_is_not_framing() {
        // The third byte of "hello" is an END_GROUP tag
        let data = len_field(2, b"hello");
        for decoder in [Decoder::new(), printable_first()] {
            let message = decoder.decode(&data).unwrap();
            assert_eq!(
                message.get(2).and_then(Field::first),
                Some(&Value::String("hello".into()))
            );
        }
    }

    #[test]
    fn test_repeated_scalar() {
        let message = decode(&[0x18, 0x07, 0x18, 0x09]).unwrap();
        assert_eq!(
            message.get(3),
            Some(&Field::Repeated(vec![Value::Varint(7), Value::Varint(9)]))
        );
        assert_eq!(message.len(), 1);
    }

    #[test]
    fn test_fixed_width() {
        let mut data = vec![0x0D, 0x78, 0x56, 0x34, 0x12];
        data.push(0x11);
        data.extend_from_slice(&0x1234_5678_9ABC_DEF0u64.to_le_bytes());

        let message = decode(&data).unwrap();
        let expected: Message = [
            (1, Value::Fixed32(0x1234_5678)),
            (2, Value::Fixed64(0x1234_5678_9ABC_DEF0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(message, expected);
    }

    #[test]
    fn test_top_level_length_overrun() {
        let err = decode(&[0x12, 0x05, b'a']).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput {
                offset: 2,
                needed: 5,
                remaining: 1
            }
        ));
    }

    #[test]
    fn test_nested_length_overrun_falls_back() {
        // Field 1 holds three bytes declaring a five-byte inner payload
        let data = len_field(1, &[0x12, 0x05, b'a']);
        let message = decode(&data).unwrap();
        assert_eq!(
            message.get(1).and_then(Field::first),
            Some(&Value::String("\u{12}\u{5}a".into()))
        );
    }

    #[test]
    fn test_message_preferred_over_text() {
        // 0x08 0x01 is valid UTF-8 and the message {1: 1}
        let data = len_field(4, &[0x08, 0x01]);
        let inner: Message = [(1, Value::Varint(1))].into_iter().collect();

        for decoder in [Decoder::new(), printable_first()] {
            let message = decoder.decode(&data).unwrap();
            assert_eq!(
                message.get(4).and_then(Field::first),
                Some(&Value::Message(inner.clone()))
            );
        }
    }

    #[test]
    fn test_bytes_fallback() {
        let message = decode(&[0x0A, 0x02, 0xFF, 0xFE]).unwrap();
        assert_eq!(
            message.get(1).and_then(Field::first),
            Some(&Value::Bytes(Bytes::from_static(&[0xFF, 0xFE])))
        );
    }

    #[test]
    fn test_empty_payload_is_empty_message() {
        let message = decode(&[0x0A, 0x00]).unwrap();
        assert_eq!(
            message.get(1).and_then(Field::first),
            Some(&Value::Message(Message::new()))
        );
    }

    #[test]
    fn test_groups_rejected() {
        for tag in [0x0B, 0x0C] {
            assert!(matches!(
                decode(&[tag]),
                Err(Error::InvalidTag { offset: 0, .. })
            ));
        }
        assert!(matches!(
            decode(&[0x08, 0x01, 0x0E]),
            Err(Error::InvalidTag { offset: 2, tag: 0x0E })
        ));
    }

    #[test]
    fn test_top_level_failure_after_valid_fields() {
        let err = decode(&[0x0A, 0x02, 0x08, 0x01, 0x10]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput {
                offset: 5,
                needed: 1,
                remaining: 0
            }
        ));

        assert!(matches!(
            decode(&[0x0D, 0x01, 0x02]),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_decode_bounded() {
        let decoder = Decoder::new();
        let data = [0x08, 0x01, 0x08, 0x02];

        let message = decoder.decode_bounded(&data, 2).unwrap();
        assert_eq!(message.get(1), Some(&Field::Single(Value::Varint(1))));

        // The varint straddles the range end
        assert!(matches!(
            decoder.decode_bounded(&[0x08, 0x96, 0x01], 2),
            Err(Error::BoundaryViolation { .. })
        ));
        assert!(matches!(
            decoder.decode_bounded(&data, 5),
            Err(Error::BoundaryViolation { .. })
        ));
    }

    #[test]
    fn test_interpret() {
        let decoder = Decoder::new();
        assert_eq!(
            decoder.interpret(b"hello").unwrap(),
            Value::String("hello".into())
        );
        assert_eq!(
            decoder.interpret(&[0xFF]).unwrap(),
            Value::Bytes(Bytes::from_static(&[0xFF]))
        );
    }

    #[test]
    fn test_depth_limit() {
        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(8));

        let mut message = decoder.decode(&nested(8)).unwrap();
        for _ in 0..8 {
            let inner = match message.get(1).and_then(Field::first) {
                Some(Value::Message(inner)) => inner.clone(),
                other => panic!("expected nested message, got {:?}", other),
            };
            message = inner;
        }
        assert_eq!(message.get(1), Some(&Field::Single(Value::Varint(1))));

        assert!(matches!(
            decoder.decode(&nested(9)),
            Err(Error::DepthExceeded { max_depth: 8, .. })
        ));
    }

    /// `{1: {1: {2: leaf}}}`; the leaf sits in a message at depth 2
    fn leaf_at_depth_two(leaf: &[u8]) -> Vec<u8> {
        len_field(1, &len_field(1, &len_field(2, leaf)))
    }

    fn leaf(message: &Message) -> Option<&Value> {
        let mut current = message;
        for _ in 0..2 {
            current = current.get(1).and_then(Field::first)?.as_message()?;
        }
        current.get(2).and_then(Field::first)
    }

    #[test]
    fn test_text_leaf_at_depth_limit() {
        let data = leaf_at_depth_two(b"hello");

        for max_depth in [2, 3] {
            let decoder = Decoder::with_config(DecoderConfig::new().max_depth(max_depth));
            let message = decoder.decode(&data).unwrap();
            assert_eq!(leaf(&message), Some(&Value::String("hello".into())));
        }
    }

    #[test]
    fn test_empty_leaf_at_depth_limit() {
        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(2));

        let message = decoder.decode(&leaf_at_depth_two(&[])).unwrap();
        assert_eq!(leaf(&message), Some(&Value::String(String::new())));

        // One level up the same payload is an empty message
        let message = decoder.decode(&len_field(1, &len_field(2, &[]))).unwrap();
        let inner = message.get(1).and_then(Field::first).and_then(Value::as_message);
        assert_eq!(
            inner.and_then(|m| m.get(2)).and_then(Field::first),
            Some(&Value::Message(Message::new()))
        );
    }

    #[test]
    fn test_bytes_leaf_at_depth_limit() {
        let data = leaf_at_depth_two(&[0xFF, 0xFE]);
        let decoder = Decoder::with_config(DecoderConfig::new().max_depth(2));

        let message = decoder.decode(&data).unwrap();
        assert_eq!(
            leaf(&message),
            Some(&Value::Bytes(Bytes::from_static(&[0xFF, 0xFE])))
        );
    }

    #[test]
    fn test_framing_leaf_at_depth_limit() {
        // "hi" is well-formed framing, so reading it as text would hide a
        // message nested past the limit
        let data = leaf_at_depth_two(b"hi");
        let config = DecoderConfig::new().max_depth(2);

        assert!(matches!(
            Decoder::with_config(config.clone()).decode(&data),
            Err(Error::DepthExceeded {
                offset: 6,
                max_depth: 2
            })
        ));

        let decoder =
            Decoder::with_config(config.disambiguation(Disambiguation::PrintableTextFirst));
        let message = decoder.decode(&data).unwrap();
        assert_eq!(leaf(&message), Some(&Value::String("hi".into())));
    }

    #[test]
    fn test_is_framing() {
        assert!(is_framing(Cursor::bounded(&[])));
        assert!(is_framing(Cursor::bounded(&[0x08, 0x01, 0x12, 0x01, 0xFF])));
        assert!(!is_framing(Cursor::bounded(b"hello")));
        assert!(!is_framing(Cursor::bounded(&[0x12, 0x05, b'a'])));
        assert!(!is_framing(Cursor::bounded(&[0x0B])));
    }

    #[test]
    fn test_oversized_length_at_top_level() {
        // A prefix above i32::MAX is rejected before it is compared with the
        // remaining input
        let err = decode(&[0x0A, 0x80, 0x80, 0x80, 0x80, 0x08]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidLength {
                offset: 1,
                length: 0x8000_0000,
                ..
            }
        ));

        let err = decode(&[0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0x07]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedInput {
                offset: 6,
                needed: 0x7FFF_FFFF,
                remaining: 0
            }
        ));
    }

    #[test]
    fn test_field_number_range() {
        // Field 2^29 - 1 with varint 1
        let message = decode(&[0xF8, 0xFF, 0xFF, 0xFF, 0x0F, 0x01]).unwrap();
        assert_eq!(
            message.get(crate::wire::MAX_FIELD_NUMBER),
            Some(&Field::Single(Value::Varint(1)))
        );

        // Field 2^29 still fits in a five-byte tag
        let err = decode(&[0x80, 0x80, 0x80, 0x80, 0x10, 0x01]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidTag {
                offset: 0,
                tag: 0x1_0000_0000
            }
        ));
    }

    #[test]
    fn test_adversarial_depth_terminates() {
        let err = decode(&nested(2_000)).unwrap_err();
        assert!(matches!(
            err,
            Error::DepthExceeded {
                max_depth: DEFAULT_MAX_DEPTH,
                ..
            }
        ));
    }

    #[test]
    fn test_is_printable() {
        assert!(is_printable("line1\nline2\ttab"));
        assert!(!is_printable(""));
        assert!(!is_printable("a\u{0}b"));
    }

    #[test]
    fn test_decode_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x08, 0x2A]).unwrap();

        let message = decode_file(file.path()).unwrap();
        assert_eq!(message.get(1), Some(&Field::Single(Value::Varint(42))));

        assert!(matches!(
            decode_file("/nonexistent/payload.bin"),
            Err(Error::FileRead { .. })
        ));
    }
}
