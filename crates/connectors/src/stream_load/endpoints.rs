use crate::error::ClientError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Configured load endpoints with a sticky cursor. A connection failure moves
/// the cursor past the failing endpoint so later requests start elsewhere.
#[derive(Debug)]
pub struct EndpointRing {
    endpoints: Vec<String>,
    current: AtomicUsize,
}

impl EndpointRing {
    pub fn new(urls: &[String]) -> Result<Self, ClientError> {
        let endpoints = urls
            .iter()
            .map(|url| normalize(url))
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(ClientError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            current: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Every endpoint once, starting at the cursor.
    pub fn rotation(&self) -> impl Iterator<Item = (usize, &str)> {
        let start = self.current.load(Ordering::Relaxed) % self.endpoints.len();
        (0..self.endpoints.len()).map(move |offset| {
            let idx = (start + offset) % self.endpoints.len();
            (idx, self.endpoints[idx].as_str())
        })
    }

    /// Moves the cursor past `failed` unless another request already did.
    pub fn mark_failed(&self, failed: usize) {
        let next = (failed + 1) % self.endpoints.len();
        let _ = self
            .current
            .compare_exchange(failed, next, Ordering::Relaxed, Ordering::Relaxed);
    }
}

fn normalize(url: &str) -> Result<String, ClientError> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ClientError::InvalidEndpoint(url.to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else if trimmed.contains("://") {
        Err(ClientError::InvalidEndpoint(url.to_string()))
    } else {
        Ok(format!("http://{trimmed}"))
    }
}
