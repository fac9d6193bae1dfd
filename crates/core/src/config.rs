//! Environment variable helpers shared by the binaries' `from_env` loaders.
//!
//! A missing or malformed required variable is a [`ConfigError`]; binaries
//! treat it as fatal and refuse to start.

use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Read a required, non-empty variable.
pub fn env_required(var: &'static str) -> Result<String, ConfigError> {
    env_optional(var).ok_or(ConfigError::Missing(var))
}

/// Read an optional variable. Empty values count as unset.
pub fn env_optional(var: &'static str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a variable, falling back to `default` when unset.
pub fn env_or(var: &'static str, default: &str) -> String {
    env_optional(var).unwrap_or_else(|| default.to_string())
}

/// Read and parse a variable, falling back to `default` when unset.
pub fn env_parse_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(var) {
        None => Ok(default),
        Some(value) => parse_value(var, &value),
    }
}

/// Parse an already-read value, attributing failures to `var`.
pub fn parse_value<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
