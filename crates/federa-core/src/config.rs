//! Session configuration
//!
//! Names the federation and federate, the object model document, and the
//! retry and callback-pump policies used during initialization. Loadable from
//! RON through `federa-script`.
//!
//! ```
//! use federa_core::{Backoff, SessionConfig};
//!
//! let config = SessionConfig::new("Main Sim Federation", "Main Sim Federate", "MainSim.xml");
//! assert_eq!(config.join.max_attempts, 10);
//! assert_eq!(config.join.backoff, Backoff::None);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default federate-type tag sent when joining
pub const DEFAULT_FEDERATE_TYPE: &str = "FederaFederate";

/// Default number of join attempts
pub const DEFAULT_JOIN_ATTEMPTS: u32 = 10;

/// Configuration for one federate session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the federation execution to create/join
    pub federation_name: String,
    /// Name of this federate within the federation
    pub federate_name: String,
    /// Federate-type tag declared on join
    #[serde(default = "default_federate_type")]
    pub federate_type: String,
    /// Location of the federation object model document
    pub fom_location: String,
    /// Create the federation execution before joining
    #[serde(default = "default_true")]
    pub create_federation: bool,
    /// Treat "federation already exists" as success and go on to join
    #[serde(default)]
    pub tolerate_existing_federation: bool,
    /// Join retry policy
    #[serde(default)]
    pub join: JoinPolicy,
    /// Callback pump window used after state-changing calls
    #[serde(default)]
    pub callback_wait: CallbackWait,
    /// Interval between ticks for drivers that loop
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl SessionConfig {
    /// Create a configuration with default policies
    pub fn new(
        federation_name: impl Into<String>,
        federate_name: impl Into<String>,
        fom_location: impl Into<String>,
    ) -> Self {
        Self {
            federation_name: federation_name.into(),
            federate_name: federate_name.into(),
            federate_type: default_federate_type(),
            fom_location: fom_location.into(),
            create_federation: true,
            tolerate_existing_federation: false,
            join: JoinPolicy::default(),
            callback_wait: CallbackWait::default(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }

    /// Set the federate-type tag
    pub fn with_federate_type(mut self, federate_type: impl Into<String>) -> Self {
        self.federate_type = federate_type.into();
        self
    }

    /// Set the join retry policy
    pub fn with_join_policy(mut self, join: JoinPolicy) -> Self {
        self.join = join;
        self
    }

    /// Skip creating the federation execution (join an existing one)
    pub fn join_only(mut self) -> Self {
        self.create_federation = false;
        self
    }

    /// Proceed to join when the federation already exists
    pub fn tolerate_existing(mut self) -> Self {
        self.tolerate_existing_federation = true;
        self
    }

    /// Set the callback pump window
    pub fn with_callback_wait(mut self, callback_wait: CallbackWait) -> Self {
        self.callback_wait = callback_wait;
        self
    }

    /// Tick interval as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check the configuration before any bus call is made
    pub fn validate(&self) -> Result<()> {
        require_non_empty("federation_name", &self.federation_name)?;
        require_non_empty("federate_name", &self.federate_name)?;
        require_non_empty("federate_type", &self.federate_type)?;
        require_non_empty("fom_location", &self.fom_location)?;
        if self.join.max_attempts == 0 {
            return Err(Error::invalid_config("join.max_attempts must be at least 1"));
        }
        self.callback_wait.validate()
    }
}

/// How many times to try joining, and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    #[serde(default)]
    pub backoff: Backoff,
}

impl JoinPolicy {
    /// Retry immediately up to `max_attempts` times
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
        }
    }
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self::immediate(DEFAULT_JOIN_ATTEMPTS)
    }
}

/// Delay strategy between join attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backoff {
    /// Retry immediately
    #[default]
    None,
    /// Double the delay after every failure, starting at `initial_ms`, capped at `max_ms`
    Exponential { initial_ms: u64, max_ms: u64 },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { initial_ms, max_ms } => {
                let shift = attempt.saturating_sub(1).min(32);
                let ms = initial_ms.saturating_mul(1u64 << shift).min(max_ms);
                Duration::from_millis(ms)
            }
        }
    }
}

/// Bounds for a callback pump, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CallbackWait {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl CallbackWait {
    /// Create a pump window
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Zero-length window (poll without waiting)
    pub fn immediate() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Lower bound as a duration
    pub fn min(&self) -> Duration {
        secs_to_duration(self.min_secs)
    }

    /// Upper bound as a duration
    pub fn max(&self) -> Duration {
        secs_to_duration(self.max_secs)
    }

    fn validate(&self) -> Result<()> {
        let representable = Duration::try_from_secs_f64(self.min_secs).is_ok()
            && Duration::try_from_secs_f64(self.max_secs).is_ok();
        if !representable || self.min_secs > self.max_secs {
            return Err(Error::invalid_config(format!(
                "callback_wait must satisfy 0 <= min_secs <= max_secs within Duration range, got {}..{}",
                self.min_secs, self.max_secs
            )));
        }
        Ok(())
    }
}

impl Default for CallbackWait {
    fn default() -> Self {
        Self::new(0.1, 0.2)
    }
}

// Negative and NaN clamp to zero, anything too large for a Duration saturates
fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_config(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn default_federate_type() -> String {
    DEFAULT_FEDERATE_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::new("Fed", "Me", "model.xml")
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.federate_type, DEFAULT_FEDERATE_TYPE);
        assert!(config.create_federation);
        assert!(!config.tolerate_existing_federation);
        assert_eq!(config.join, JoinPolicy::immediate(10));
        assert_eq!(config.callback_wait, CallbackWait::new(0.1, 0.2));
        assert_eq!(config.tick_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_rejects_empty_names() {
        let mut bad = config();
        bad.federation_name = String::new();
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));

        let mut bad = config();
        bad.fom_location = "  ".to_string();
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let bad = config().with_join_policy(JoinPolicy::immediate(0));
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_inverted_callback_window() {
        let bad = config().with_callback_wait(CallbackWait::new(0.5, 0.1));
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
        assert!(config().with_callback_wait(CallbackWait::immediate()).validate().is_ok());
    }

    #[test]
    fn test_rejects_window_too_large_for_duration() {
        let bad = config().with_callback_wait(CallbackWait::new(0.0, 1e20));
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));

        let bad = config().with_callback_wait(CallbackWait::new(f64::NAN, 0.2));
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_unvalidated_window_saturates() {
        let wait = CallbackWait::new(-1.0, 1e20);
        assert_eq!(wait.min(), Duration::ZERO);
        assert_eq!(wait.max(), Duration::MAX);
        assert_eq!(CallbackWait::new(f64::NAN, f64::INFINITY).min(), Duration::ZERO);
    }

    #[test]
    fn test_no_backoff_is_zero_delay() {
        assert_eq!(Backoff::None.delay_after(1), Duration::ZERO);
        assert_eq!(Backoff::None.delay_after(9), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial_ms: 10,
            max_ms: 100,
        };
        assert_eq!(backoff.delay_after(1), Duration::from_millis(10));
        assert_eq!(backoff.delay_after(2), Duration::from_millis(20));
        assert_eq!(backoff.delay_after(4), Duration::from_millis(80));
        assert_eq!(backoff.delay_after(5), Duration::from_millis(100));
        assert_eq!(backoff.delay_after(60), Duration::from_millis(100));
    }
}
