//! Typed in-process attribute values

use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed attribute value before it is encoded for the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Signed integer (radius, counts, ...)
    Int(i64),
    /// Pair of signed integers (position, velocity, ...)
    Vector2(i64, i64),
}

impl AttributeValue {
    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a vector
    pub fn as_vector2(&self) -> Option<(i64, i64)> {
        match self {
            AttributeValue::Vector2(x, y) => Some((*x, *y)),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Int(_) => "int",
            AttributeValue::Vector2(..) => "vector2",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Vector2(x, y) => write!(f, "({},{})", x, y),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        AttributeValue::Int(i as i64)
    }
}

impl From<(i64, i64)> for AttributeValue {
    fn from((x, y): (i64, i64)) -> Self {
        AttributeValue::Vector2(x, y)
    }
}

impl From<[i64; 2]> for AttributeValue {
    fn from([x, y]: [i64; 2]) -> Self {
        AttributeValue::Vector2(x, y)
    }
}
