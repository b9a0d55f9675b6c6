use crate::error::TelemetryError;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_directive` (e.g. `"info"`)
/// is used. Must be called once, by the binary, before any load job starts.
pub fn init(default_directive: &str) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))
}
