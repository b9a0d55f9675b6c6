use engine_core::{error::StreamLoadError, retry::RetryDisposition};

/// Transport trouble is retried; answers from the store are final.
pub fn classify_stream_load_error(err: &StreamLoadError) -> RetryDisposition {
    match err {
        StreamLoadError::Io { .. } | StreamLoadError::Timeout { .. } => RetryDisposition::Retry,
        StreamLoadError::Http { status, .. } => classify_http_status(*status),
        StreamLoadError::Protocol(_) => RetryDisposition::Retry,
        StreamLoadError::Rejected { .. } => RetryDisposition::Stop,
        StreamLoadError::LabelAlreadyExists(_) => RetryDisposition::Stop,
        StreamLoadError::Closed => RetryDisposition::Stop,
        StreamLoadError::Cancelled => RetryDisposition::Stop,
    }
}

fn classify_http_status(status: u16) -> RetryDisposition {
    match status {
        408 | 429 | 500..=599 => RetryDisposition::Retry,
        _ => RetryDisposition::Stop,
    }
}
