use thiserror::Error;

/// Errors raised while resolving or validating a load job's options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required option was not supplied under any of its accepted keys.
    #[error("Missing required option '{0}'")]
    MissingKey(String),

    /// An option was supplied but could not be parsed into its type.
    #[error("Invalid value '{value}' for option '{key}': expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, expected: &'static str) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}
