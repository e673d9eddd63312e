//! Attribute codecs: typed value <-> bus byte representation
//!
//! The set of codecs is closed. Each attribute picks one when its class is
//! defined and keeps it for the lifetime of the definition.
//!
//! | codec     | value                     | bytes      |
//! |-----------|---------------------------|------------|
//! | `Integer` | `AttributeValue::Int(5)`  | `5`        |
//! | `Vector2` | `AttributeValue::Vector2(3, 4)` | `(3,4)` |
//!
//! Encoding is deterministic: the same value always yields the same bytes.

use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Encoding failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The value does not match the codec's type
    #[error("{codec} codec cannot encode a {got} value")]
    TypeMismatch { codec: AttributeCodec, got: &'static str },
}

/// Encode/decode strategy for one attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeCodec {
    /// Signed integer as canonical decimal text
    Integer,
    /// Pair of signed integers as `(x,y)` text
    Vector2,
}

impl AttributeCodec {
    /// Encode a typed value into its bus representation
    pub fn encode(&self, value: &AttributeValue) -> Result<Vec<u8>, CodecError> {
        match (self, value) {
            (AttributeCodec::Integer, AttributeValue::Int(i)) => Ok(i.to_string().into_bytes()),
            (AttributeCodec::Vector2, AttributeValue::Vector2(x, y)) => {
                Ok(format!("({},{})", x, y).into_bytes())
            }
            _ => Err(CodecError::TypeMismatch {
                codec: *self,
                got: value.type_name(),
            }),
        }
    }

    /// Decode a bus representation back into a typed value
    ///
    /// Returns `None` for malformed input, including the zero-length
    /// encoding used for attributes that were never set.
    ///
    /// Decoding is the inverse of [`encode`](Self::encode):
    /// `decode(encode(v)) == Some(v)` for every value the codec accepts.
    pub fn decode(&self, bytes: &[u8]) -> Option<AttributeValue> {
        let text = std::str::from_utf8(bytes).ok()?;
        match self {
            AttributeCodec::Integer => parse_int(text).map(AttributeValue::Int),
            AttributeCodec::Vector2 => {
                let inner = text.strip_prefix('(')?.strip_suffix(')')?;
                let (x, y) = inner.split_once(',')?;
                Some(AttributeValue::Vector2(parse_int(x)?, parse_int(y)?))
            }
        }
    }

    /// Check whether this codec can encode the given value
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeCodec::Integer, AttributeValue::Int(_))
                | (AttributeCodec::Vector2, AttributeValue::Vector2(..))
        )
    }

    /// Get the codec name
    pub fn name(&self) -> &'static str {
        match self {
            AttributeCodec::Integer => "integer",
            AttributeCodec::Vector2 => "vector2",
        }
    }
}

impl fmt::Display for AttributeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Canonical decimal only: `+5` and ` 5` are not produced by `encode`.
fn parse_int(text: &str) -> Option<i64> {
    if text.starts_with('+') {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_integer_encoding() {
        let bytes = AttributeCodec::Integer.encode(&AttributeValue::Int(5)).unwrap();
        assert_eq!(bytes, b"5");

        let bytes = AttributeCodec::Integer.encode(&AttributeValue::Int(-12)).unwrap();
        assert_eq!(bytes, b"-12");
    }

    #[test]
    fn test_vector_encoding() {
        let bytes = AttributeCodec::Vector2
            .encode(&AttributeValue::Vector2(3, 4))
            .unwrap();
        assert_eq!(bytes, b"(3,4)");

        let bytes = AttributeCodec::Vector2
            .encode(&AttributeValue::Vector2(-1, 0))
            .unwrap();
        assert_eq!(bytes, b"(-1,0)");
    }

    #[test]
    fn test_type_mismatch() {
        let err = AttributeCodec::Integer
            .encode(&AttributeValue::Vector2(1, 2))
            .unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                codec: AttributeCodec::Integer,
                got: "vector2"
            }
        );
        assert!(!AttributeCodec::Vector2.accepts(&AttributeValue::Int(1)));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert_eq!(AttributeCodec::Integer.decode(b""), None);
        assert_eq!(AttributeCodec::Integer.decode(b"5x"), None);
        assert_eq!(AttributeCodec::Integer.decode(b"+5"), None);
        assert_eq!(AttributeCodec::Vector2.decode(b""), None);
        assert_eq!(AttributeCodec::Vector2.decode(b"(3;4)"), None);
        assert_eq!(AttributeCodec::Vector2.decode(b"3,4"), None);
        assert_eq!(AttributeCodec::Vector2.decode(&[0xff, 0xfe]), None);
    }

    #[test]
    fn test_codec_serde_names() {
        assert_eq!(AttributeCodec::Integer.to_string(), "integer");
        assert_eq!(AttributeCodec::Vector2.to_string(), "vector2");
    }

    proptest! {
        #[test]
        fn test_integer_round_trip(v in any::<i64>()) {
            let codec = AttributeCodec::Integer;
            let bytes = codec.encode(&AttributeValue::Int(v)).unwrap();
            prop_assert_eq!(codec.decode(&bytes), Some(AttributeValue::Int(v)));
        }

        #[test]
        fn test_vector_round_trip(x in any::<i64>(), y in any::<i64>()) {
            let codec = AttributeCodec::Vector2;
            let bytes = codec.encode(&AttributeValue::Vector2(x, y)).unwrap();
            prop_assert_eq!(codec.decode(&bytes), Some(AttributeValue::Vector2(x, y)));
        }

        #[test]
        fn test_encoding_is_deterministic(x in any::<i64>(), y in any::<i64>()) {
            let value = AttributeValue::Vector2(x, y);
            let first = AttributeCodec::Vector2.encode(&value).unwrap();
            let second = AttributeCodec::Vector2.encode(&value).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
