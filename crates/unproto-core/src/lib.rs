//! # unproto-core
//!
//! A library for decoding Protocol Buffer messages without their schema.
//!
//! This crate provides the core functionality for:
//! - Reading the protobuf wire format (varints, fixed-width values, tags)
//! - Decoding an unknown message into a field-number keyed tree
//! - Guessing whether length-delimited payloads are messages, text or bytes
//! - Rendering the result as text or JSON
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Bounded cursor and wire format primitives
//! - [`decode`]: The decoder and the decoded value model
//! - [`render`]: Traversal and output formats
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use unproto_core::{Decoder, Field, Value};
//!
//! // field 1 = 150, field 3 = 7, field 3 = 9
//! let data = [0x08, 0x96, 0x01, 0x18, 0x07, 0x18, 0x09];
//!
//! let message = Decoder::new().decode(&data)?;
//! assert_eq!(message.get(1), Some(&Field::Single(Value::Varint(150))));
//! assert_eq!(
//!     message.get(3),
//!     Some(&Field::Repeated(vec![Value::Varint(7), Value::Varint(9)]))
//! );
//! # Ok::<(), unproto_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`MessageVisitor`]: Walk decoded messages for custom output
//! - [`DecoderConfig`]: Depth limit and interpretation order
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decode;
pub mod error;
pub mod render;
pub mod wire;

// Re-export primary types for convenience
pub use decode::{
    decode, decode_file, decode_file_with_config, Decoder, DecoderConfig, Disambiguation, Field,
    Message, Value,
};
pub use error::{Error, Result};
pub use render::{render_text, walk, MessageVisitor, NullVisitor, StatsVisitor, TextRenderer};
pub use wire::MAX_FIELD_NUMBER;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
