use thiserror::Error;

/// Failures at the bulk-load protocol boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamLoadError {
    /// The endpoint could not be reached or the connection broke mid-request.
    #[error("I/O error talking to {endpoint}: {message}")]
    Io { endpoint: String, message: String },

    #[error("Request to {endpoint} timed out after {elapsed_ms} ms")]
    Timeout { endpoint: String, elapsed_ms: u64 },

    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The store answered but refused the request.
    #[error("Request for label '{label}' rejected with status '{status}': {message}")]
    Rejected {
        label: String,
        status: String,
        message: String,
    },

    #[error("Label '{0}' already exists")]
    LabelAlreadyExists(String),

    #[error("Malformed response from store: {0}")]
    Protocol(String),

    #[error("Stream handle is closed")]
    Closed,

    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("Invalid label '{label}': {reason}")]
    Invalid { label: String, reason: &'static str },
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    Init(String),
}
