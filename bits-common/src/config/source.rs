//! Tracks where a configuration value came from.

use std::fmt;

/// Origin of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Read from a `BITS_*` environment variable.
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Environment => write!(f, "environment"),
        }
    }
}

/// A value paired with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// Environment variable the value was read from, if any.
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self {
            value,
            source,
            env_var: None,
        }
    }

    pub fn default_value(value: T) -> Self {
        Self::new(value, ConfigSource::Default)
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var.into()),
        }
    }

    pub fn is_default(&self) -> bool {
        self.source == ConfigSource::Default
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Display> fmt::Display for Sourced<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "{} (from {})", self.value, var),
            None => write!(f, "{} ({})", self.value, self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_records_variable() {
        let value = Sourced::from_env(30u64, "BITS_COMMAND_TIMEOUT_SECS");
        assert_eq!(value.source, ConfigSource::Environment);
        assert_eq!(value.env_var.as_deref(), Some("BITS_COMMAND_TIMEOUT_SECS"));
        assert!(!value.is_default());
        assert_eq!(value.to_string(), "30 (from BITS_COMMAND_TIMEOUT_SECS)");
    }

    #[test]
    fn test_default_display() {
        let value = Sourced::default_value("info");
        assert!(value.is_default());
        assert_eq!(value.to_string(), "info (default)");
    }
}
