pub mod server;
pub mod tracing;

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Values accepted as "on" for boolean switches
pub const TRUE_VALUES: [&str; 5] = ["1", "T", "t", "true", "yes"];

/// Values accepted as "off" for boolean switches
pub const FALSE_VALUES: [&str; 5] = ["0", "F", "f", "false", "no"];

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Helper to load and parse environment variable with a default value
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Helper to load and parse environment variable or return error
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable into `T`, falling back to `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Read a boolean switch.
///
/// With `default == false` the switch is on only for one of [`TRUE_VALUES`];
/// with `default == true` it is off only for one of [`FALSE_VALUES`].
/// Anything else (including unset) yields the default.
pub fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => parse_flag(&raw, default),
        Err(_) => default,
    }
}

/// Interpret a raw switch value, see [`env_flag`]
pub fn parse_flag(raw: &str, default: bool) -> bool {
    if default {
        !FALSE_VALUES.contains(&raw)
    } else {
        TRUE_VALUES.contains(&raw)
    }
}
