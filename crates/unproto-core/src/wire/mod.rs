//! Low-level protobuf wire format primitives.
//!
//! This module implements the pieces of the protobuf wire format needed to
//! walk an unknown message: varints, fixed-width integers, tags and length
//! prefixes. All reads go through [`Cursor`], which never reads past the end of
//! the slice it was created over.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3, 4: SGROUP / EGROUP (deprecated, rejected by this decoder)
//! - 5: I32 (fixed32, sfixed32, float)

mod cursor;

use crate::error::{Error, Result};
use std::fmt;

pub use cursor::Cursor;

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Maximum number of bytes in a varint value (ceil(64 / 7))
pub const MAX_VARINT_BYTES: usize = 10;

/// Maximum number of bytes in a tag varint (32-bit tag)
pub const MAX_TAG_BYTES: usize = 5;

/// Maximum number of bytes in a length prefix
pub const MAX_LENGTH_BYTES: usize = 5;

/// Largest accepted length-delimited payload size
pub const MAX_LENGTH: u64 = i32::MAX as u64;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    /// Maps the low three bits of a tag to a wire type.
    ///
    /// Returns `None` for the unassigned values 6 and 7.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(WireType::Varint),
            1 => Some(WireType::I64),
            2 => Some(WireType::Len),
            3 => Some(WireType::StartGroup),
            4 => Some(WireType::EndGroup),
            5 => Some(WireType::I32),
            _ => None,
        }
    }

    /// Returns true for the deprecated group delimiters
    pub fn is_group(self) -> bool {
        matches!(self, WireType::StartGroup | WireType::EndGroup)
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Varint => "VARINT",
            WireType::I64 => "I64",
            WireType::Len => "LEN",
            WireType::StartGroup => "SGROUP",
            WireType::EndGroup => "EGROUP",
            WireType::I32 => "I32",
        };
        f.write_str(name)
    }
}

/// A decoded field tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Field number, in `1..=MAX_FIELD_NUMBER`
    pub field_number: u32,
    /// Wire type of the value that follows
    pub wire_type: WireType,
}

impl Tag {
    /// Splits a raw tag value into field number and wire type.
    ///
    /// `offset` is only used for error reporting. Group wire types are accepted
    /// here; rejecting them is up to the caller.
    pub fn from_raw(raw: u64, offset: usize) -> Result<Self> {
        let invalid = || Error::InvalidTag { offset, tag: raw };

        let wire_type = WireType::from_bits((raw & 0x07) as u8).ok_or_else(invalid)?;
        let field_number = raw >> 3;
        if field_number == 0 || field_number > u64::from(MAX_FIELD_NUMBER) {
            return Err(invalid());
        }

        Ok(Self {
            field_number: field_number as u32,
            wire_type,
        })
    }

    /// Re-packs the tag into its raw integer form
    pub fn raw(&self) -> u64 {
        (u64::from(self.field_number) << 3) | self.wire_type as u64
    }
}
