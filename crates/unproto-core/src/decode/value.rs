//! Decoded value model.

use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;

/// A value decoded without a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// VARINT field, read as an unsigned integer
    Varint(u64),
    /// I64 field, read as an unsigned little-endian integer
    Fixed64(u64),
    /// I32 field, read as an unsigned little-endian integer
    Fixed32(u32),
    /// Length-delimited payload that is valid UTF-8
    String(String),
    /// Length-delimited payload with no better interpretation
    Bytes(Bytes),
    /// Length-delimited payload that parses as a message
    Message(Message),
}

impl Value {
    /// Returns the unsigned integer view of the three integer wire types
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Varint(v) | Value::Fixed64(v) => Some(*v),
            Value::Fixed32(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    /// Returns the text if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw bytes if this is a bytes value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the nested message if this is a message value
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Short name of the inferred type
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Varint(_) => "varint",
            Value::Fixed64(_) => "fixed64",
            Value::Fixed32(_) => "fixed32",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
        }
    }
}

impl From<Message> for Value {
    fn from(message: Message) -> Self {
        Value::Message(message)
    }
}

/// All values seen for one field number of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// The field occurred once
    Single(Value),
    /// The field occurred several times, in wire order
    Repeated(Vec<Value>),
}

impl Field {
    /// Adds another occurrence, turning a single value into a sequence
    fn push(&mut self, value: Value) {
        let previous = std::mem::replace(self, Field::Repeated(Vec::new()));
        *self = match previous {
            Field::Single(first) => Field::Repeated(vec![first, value]),
            Field::Repeated(mut values) => {
                values.push(value);
                Field::Repeated(values)
            }
        };
    }

    /// All occurrences in wire order
    pub fn values(&self) -> &[Value] {
        match self {
            Field::Single(value) => std::slice::from_ref(value),
            Field::Repeated(values) => values,
        }
    }

    /// The first occurrence
    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    /// Returns true if the field occurred more than once
    pub fn is_repeated(&self) -> bool {
        matches!(self, Field::Repeated(_))
    }
}

/// Field mapping of one decoded message.
///
/// Field numbers keep their first-occurrence order. A field number seen again
/// accumulates into a [`Field::Repeated`] entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    fields: Vec<(u32, Field)>,
    index: HashMap<u32, usize>,
}

impl Message {
    /// Creates an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `field_number`
    pub fn insert(&mut self, field_number: u32, value: Value) {
        match self.index.get(&field_number) {
            Some(&i) => self.fields[i].1.push(value),
            None => {
                self.index.insert(field_number, self.fields.len());
                self.fields.push((field_number, Field::Single(value)));
            }
        }
    }

    /// Looks up a field by number
    pub fn get(&self, field_number: u32) -> Option<&Field> {
        self.index.get(&field_number).map(|&i| &self.fields[i].1)
    }

    /// Iterates fields in first-occurrence order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Field)> + '_ {
        self.fields.iter().map(|(number, field)| (*number, field))
    }

    /// Field numbers in first-occurrence order
    pub fn field_numbers(&self) -> Vec<u32> {
        self.fields.iter().map(|(number, _)| *number).collect()
    }

    /// Number of distinct field numbers
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the message has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(u32, Value)> for Message {
    fn from_iter<I: IntoIterator<Item = (u32, Value)>>(iter: I) -> Self {
        let mut message = Message::new();
        for (field_number, value) in iter {
            message.insert(field_number, value);
        }
        message
    }
}

/// Formats bytes as space-separated lowercase hex (`de ad be ef`)
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
