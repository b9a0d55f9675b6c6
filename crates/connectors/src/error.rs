use thiserror::Error;

/// Errors raised while building a stream-load client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No load endpoint was configured.
    #[error("No load endpoint configured")]
    NoEndpoints,

    #[error("Invalid load endpoint '{0}'")]
    InvalidEndpoint(String),

    /// A protocol property cannot be sent as an HTTP header.
    #[error("Property '{key}' cannot be sent as a header: {reason}")]
    InvalidHeader { key: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
