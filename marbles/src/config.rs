//! Time configuration module.
//!
//! This module provides the scheduler's tunables and loads them from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `MARBLES_INTERVAL`: Virtual time units per diagram character (default: `20`)
//! - `MARBLES_FRAME_INTERVAL_MS`: Wall-clock milliseconds between realtime
//!   frames (default: `16`)
//!
//! # Invariants
//!
//! - `interval` is always non-zero
//! - `frame_interval_ms` is always non-zero

use crate::scheduler::VirtualTime;

/// Scheduler configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()` both fields are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeConfig {
    /// Virtual time units per diagram character.
    /// Used when parsing input diagrams and encoding recorded logs.
    pub interval: VirtualTime,
    /// Milliseconds between frames in realtime mode.
    pub frame_interval_ms: u64,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            frame_interval_ms: Self::DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl TimeConfig {
    /// Default virtual time units per diagram character.
    pub const DEFAULT_INTERVAL: VirtualTime = 20;
    /// Default realtime frame interval, roughly 60 frames per second.
    pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

    const INTERVAL_VAR: &'static str = "MARBLES_INTERVAL";
    const FRAME_INTERVAL_VAR: &'static str = "MARBLES_FRAME_INTERVAL_MS";

    #[must_use]
    pub const fn with_interval(mut self, interval: VirtualTime) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub const fn with_frame_interval_ms(mut self, frame_interval_ms: u64) -> Self {
        self.frame_interval_ms = frame_interval_ms;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but is not a positive integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but is not a positive integer.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let interval = Self::load_positive(&lookup, Self::INTERVAL_VAR)?
            .unwrap_or(Self::DEFAULT_INTERVAL);
        let frame_interval_ms = Self::load_positive(&lookup, Self::FRAME_INTERVAL_VAR)?
            .unwrap_or(Self::DEFAULT_FRAME_INTERVAL_MS);

        Ok(Self {
            interval,
            frame_interval_ms,
        })
    }

    fn load_positive(
        lookup: &impl Fn(&str) -> Option<String>,
        name: &str,
    ) -> Result<Option<u64>, ConfigError> {
        let Some(value) = lookup(name) else {
            return Ok(None);
        };

        match value.trim().parse::<u64>() {
            Ok(0) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: "must be greater than zero".to_string(),
            }),
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("'{value}' is not a positive integer"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = TimeConfig::default();
        assert_eq!(config.interval, 20);
        assert_eq!(config.frame_interval_ms, 16);
    }

    #[test]
    fn test_builder_overrides() {
        let config = TimeConfig::default()
            .with_interval(100)
            .with_frame_interval_ms(5);
        assert_eq!(config.interval, 100);
        assert_eq!(config.frame_interval_ms, 5);
    }

    #[test]
    fn test_unset_vars_use_defaults() {
        let config = TimeConfig::from_vars(lookup_from(&[])).unwrap();
        assert_eq!(config, TimeConfig::default());
    }

    #[test]
    fn test_vars_are_parsed() {
        let config = TimeConfig::from_vars(lookup_from(&[
            ("MARBLES_INTERVAL", "100"),
            ("MARBLES_FRAME_INTERVAL_MS", " 33 "),
        ]))
        .unwrap();
        assert_eq!(config.interval, 100);
        assert_eq!(config.frame_interval_ms, 33);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let error = TimeConfig::from_vars(lookup_from(&[("MARBLES_INTERVAL", "0")])).unwrap_err();
        assert_eq!(
            error.to_string(),
            "invalid value for MARBLES_INTERVAL: must be greater than zero"
        );
    }

    #[test]
    fn test_non_numeric_frame_interval_rejected() {
        let error = TimeConfig::from_vars(lookup_from(&[("MARBLES_FRAME_INTERVAL_MS", "fast")]))
            .unwrap_err();
        assert_eq!(
            error,
            ConfigError::InvalidValue {
                name: "MARBLES_FRAME_INTERVAL_MS".to_string(),
                message: "'fast' is not a positive integer".to_string(),
            }
        );
    }
}
