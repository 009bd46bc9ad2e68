//! JSON conversion of decoded messages.

use crate::decode::{hex_string, Field, Message, Value};
use serde_json::{Map, Value as JsonValue};

impl Message {
    /// Converts to a JSON object keyed by field number.
    ///
    /// Keys keep first-occurrence order. Repeated fields become arrays, bytes
    /// become space-separated hex strings.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::with_capacity(self.len());
        for (field_number, field) in self.iter() {
            let value = match field {
                Field::Single(value) => value.to_json(),
                Field::Repeated(values) => {
                    JsonValue::Array(values.iter().map(Value::to_json).collect())
                }
            };
            map.insert(field_number.to_string(), value);
        }
        JsonValue::Object(map)
    }
}

impl Value {
    /// Converts a single value to JSON
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Varint(v) | Value::Fixed64(v) => JsonValue::from(*v),
            Value::Fixed32(v) => JsonValue::from(*v),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::String(hex_string(b)),
            Value::Message(m) => m.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_to_json() {
        let inner: Message = [(1, Value::Varint(1))].into_iter().collect();
        let message: Message = [
            (10, Value::Varint(150)),
            (2, Value::String("hi".into())),
            (3, Value::Varint(7)),
            (3, Value::Varint(9)),
            (4, Value::Bytes(Bytes::from_static(&[0xFF, 0xFE]))),
            (5, Value::Message(inner)),
        ]
        .into_iter()
        .collect();

        let json = message.to_json();
        assert_eq!(
            json,
            json!({
                "10": 150,
                "2": "hi",
                "3": [7, 9],
                "4": "ff fe",
                "5": { "1": 1 }
            })
        );

        // Insertion order survives serialization
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["10", "2", "3", "4", "5"]);
    }
}
