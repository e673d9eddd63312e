//! Freshness tags attached to attribute updates

use chrono::Utc;
use std::fmt;

/// Diagnostic tag sent with every attribute push
///
/// Receivers can order updates per class by `sequence`; `timestamp_ms` is the
/// sender's wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTag {
    pub class: String,
    pub sequence: u64,
    pub timestamp_ms: i64,
}

impl UpdateTag {
    /// Create a tag stamped with the current wall-clock time
    pub fn now(class: impl Into<String>, sequence: u64) -> Self {
        Self {
            class: class.into(),
            sequence,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Wire form of the tag
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parse a tag produced by [`to_bytes`](Self::to_bytes)
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?.strip_prefix("TAG: ")?;
        let (rest, timestamp) = text.rsplit_once('-')?;
        let (class, sequence) = rest.rsplit_once('-')?;
        Some(Self {
            class: class.to_string(),
            sequence: sequence.parse().ok()?,
            timestamp_ms: timestamp.parse().ok()?,
        })
    }
}

impl fmt::Display for UpdateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TAG: {}-{}-{}", self.class, self.sequence, self.timestamp_ms)
    }
}
