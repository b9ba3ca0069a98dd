#![forbid(unsafe_code)]

//! Transaction manager configuration.
//!
//! Values come from [`TransactionConfig::default`] and may be overridden by
//! environment variables:
//!
//! | Variable                  | Field               | Format                    |
//! |---------------------------|---------------------|---------------------------|
//! | `SPROP_TXN_SESSION`       | `session_name`      | non-empty string          |
//! | `SPROP_ASSERT_INVARIANTS` | `assert_invariants` | `1/0/true/false/yes/no/on/off` |
//!
//! Unparseable values are reported, not fatal: the default is kept and a
//! [`ConfigError`] is added to the diagnostics.

use std::env;
use std::fmt;

use crate::text::Name;

pub const ENV_SESSION_NAME: &str = "SPROP_TXN_SESSION";
pub const ENV_ASSERT_INVARIANTS: &str = "SPROP_ASSERT_INVARIANTS";

/// Session name recorded with every transaction opened by the manager.
pub const DEFAULT_SESSION_NAME: &str = "SimpleProperties";

#[derive(Debug, Clone)]
pub struct TransactionConfig {
    /// Session name passed to the log on every begin.
    pub session_name: Name,
    /// Panic when the log contradicts the manager's bookkeeping. When off,
    /// the violation is logged and reported as an unknown error.
    pub assert_invariants: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            session_name: Name::new(DEFAULT_SESSION_NAME),
            assert_invariants: cfg!(debug_assertions),
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct TransactionConfigParse {
    pub config: TransactionConfig,
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl TransactionConfig {
    #[must_use]
    pub fn new(session_name: impl Into<Name>) -> Self {
        Self {
            session_name: session_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_assert_invariants(mut self, assert_invariants: bool) -> Self {
        self.assert_invariants = assert_invariants;
        self
    }

    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> TransactionConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables, keeping every diagnostic.
    #[must_use]
    pub fn from_env_with_diagnostics() -> TransactionConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.session_name.is_none() {
            errors.push(ConfigError::new(
                "session_name",
                self.session_name.as_str(),
                "must not be blank",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn from_env_with<F>(mut get: F) -> TransactionConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = TransactionConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_SESSION_NAME) {
        if value.trim().is_empty() {
            errors.push(ConfigError::new(
                "session_name",
                value,
                "expected a non-empty session name",
            ));
        } else {
            config.session_name = Name::new(value.trim());
        }
    }

    if let Some(value) = get(ENV_ASSERT_INVARIANTS) {
        match parse_bool(&value) {
            Some(parsed) => config.assert_invariants = parsed,
            None => errors.push(ConfigError::new(
                "assert_invariants",
                value,
                "expected bool (1/0/true/false)",
            )),
        }
    }

    if let Err(mut invalid) = config.validate() {
        errors.append(&mut invalid);
    }

    TransactionConfigParse { config, errors }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
