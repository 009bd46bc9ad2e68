//! Traversal and rendering of decoded messages.
//!
//! This module provides the [`MessageVisitor`] trait for walking a decoded
//! [`Message`] tree, together with a few stock visitors:
//!
//! - [`NullVisitor`] discards everything
//! - [`StatsVisitor`] collects counts
//! - [`TextRenderer`] writes an indented, human-readable listing
//!
//! With the `json` feature, `Message::to_json` converts to `serde_json`.

#[cfg(feature = "json")]
mod json;

use crate::decode::{hex_string, Message, Value};
use std::fmt::{Result, Write as FmtWrite};

/// Trait for walking the fields of a decoded message.
///
/// All methods default to doing nothing. `depth` is the nesting depth of the
/// message concerned: 0 for the outermost message.
///
/// # Example
///
/// ```
/// use unproto_core::render::{walk, MessageVisitor};
/// use unproto_core::{decode, Value};
/// use std::fmt::Result;
///
/// struct MaxField(u32);
///
/// impl MessageVisitor for MaxField {
///     fn visit_value(&mut self, field_number: u32, _value: &Value, _depth: usize) -> Result {
///         self.0 = self.0.max(field_number);
///         Ok(())
///     }
/// }
///
/// let message = decode(&[0x08, 0x01, 0x38, 0x02])?;
/// let mut visitor = MaxField(0);
/// walk(&message, &mut visitor).unwrap();
/// assert_eq!(visitor.0, 7);
/// # Ok::<(), unproto_core::Error>(())
/// ```
pub trait MessageVisitor {
    /// Called before the fields of a message. `field_number` is `None` for
    /// the outermost message.
    fn enter_message(&mut self, field_number: Option<u32>, depth: usize) -> Result {
        let _ = (field_number, depth);
        Ok(())
    }

    /// Called after the fields of a message
    fn exit_message(&mut self, field_number: Option<u32>, depth: usize) -> Result {
        let _ = (field_number, depth);
        Ok(())
    }

    /// Called for every non-message value, in wire order within a field
    fn visit_value(&mut self, field_number: u32, value: &Value, depth: usize) -> Result {
        let _ = (field_number, value, depth);
        Ok(())
    }
}

/// Walks `message` depth-first in field order
pub fn walk<V: MessageVisitor + ?Sized>(message: &Message, visitor: &mut V) -> Result {
    visitor.enter_message(None, 0)?;
    walk_fields(message, visitor, 0)?;
    visitor.exit_message(None, 0)
}

fn walk_fields<V: MessageVisitor + ?Sized>(
    message: &Message,
    visitor: &mut V,
    depth: usize,
) -> Result {
    for (field_number, field) in message.iter() {
        for value in field.values() {
            match value {
                Value::Message(inner) => {
                    visitor.enter_message(Some(field_number), depth + 1)?;
                    walk_fields(inner, visitor, depth + 1)?;
                    visitor.exit_message(Some(field_number), depth + 1)?;
                }
                other => visitor.visit_value(field_number, other, depth)?,
            }
        }
    }
    Ok(())
}

/// A no-op visitor that discards all output
pub struct NullVisitor;

impl MessageVisitor for NullVisitor {}

/// A visitor that collects statistics about a decoded message
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsVisitor {
    /// Number of messages, including the outermost one
    pub message_count: usize,
    /// Number of non-message values
    pub value_count: usize,
    /// Number of integer values (VARINT, I32, I64)
    pub integer_count: usize,
    /// Number of string values
    pub string_count: usize,
    /// Number of raw byte values
    pub bytes_count: usize,
    /// Deepest message nesting seen
    pub max_depth: usize,
}

impl MessageVisitor for StatsVisitor {
    fn enter_message(&mut self, _field_number: Option<u32>, depth: usize) -> Result {
        self.message_count += 1;
        self.max_depth = self.max_depth.max(depth);
        Ok(())
    }

    fn visit_value(&mut self, _field_number: u32, value: &Value, _depth: usize) -> Result {
        self.value_count += 1;
        match value {
            Value::String(_) => self.string_count += 1,
            Value::Bytes(_) => self.bytes_count += 1,
            _ => self.integer_count += 1,
        }
        Ok(())
    }
}

/// Configuration for text rendering
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
        }
    }
}

impl RenderConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }
}

/// Renders a message as indented text.
///
/// ```text
/// 1: 150
/// 2: "hi"
/// 3: {
///   1: 305419896i32
///   2: <ff fe>
/// }
/// ```
#[derive(Debug, Default)]
pub struct TextRenderer {
    output: String,
    config: RenderConfig,
}

impl TextRenderer {
    /// Creates a renderer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer with custom configuration
    pub fn with_config(config: RenderConfig) -> Self {
        Self {
            output: String::new(),
            config,
        }
    }

    /// Returns the rendered text
    pub fn finish(self) -> String {
        self.output
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.output.push_str(&self.config.indent_str);
        }
    }
}

impl MessageVisitor for TextRenderer {
    fn enter_message(&mut self, field_number: Option<u32>, depth: usize) -> Result {
        if let Some(number) = field_number {
            self.indent(depth - 1);
            writeln!(self.output, "{}: {{", number)?;
        }
        Ok(())
    }

    fn exit_message(&mut self, field_number: Option<u32>, depth: usize) -> Result {
        if field_number.is_some() {
            self.indent(depth - 1);
            writeln!(self.output, "}}")?;
        }
        Ok(())
    }

    fn visit_value(&mut self, field_number: u32, value: &Value, depth: usize) -> Result {
        self.indent(depth);
        write!(self.output, "{}: ", field_number)?;
        match value {
            Value::Varint(v) => writeln!(self.output, "{}", v),
            Value::Fixed64(v) => writeln!(self.output, "{}i64", v),
            Value::Fixed32(v) => writeln!(self.output, "{}i32", v),
            Value::String(s) => writeln!(self.output, "{:?}", s),
            Value::Bytes(b) => writeln!(self.output, "<{}>", hex_string(b)),
            // Nested messages go through enter_message/exit_message
            Value::Message(_) => writeln!(self.output, "{{}}"),
        }
    }
}

/// Renders a message as indented text with the default configuration
pub fn render_text(message: &Message) -> String {
    let mut renderer = TextRenderer::new();
    // Writing into a String cannot fail
    let _ = walk(message, &mut renderer);
    renderer.finish()
}
