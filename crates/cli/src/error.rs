use engine_config::ConfigError;
use engine_processing::error::JobError;
use engine_runtime::error::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options: {0}")]
    Options(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input at line {line}: {reason}")]
    Input { line: usize, reason: String },

    #[error("Failed to plan the write: {0}")]
    Plan(#[from] JobError),

    #[error("Load failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

impl CliError {
    /// True when the run stopped because of a shutdown signal.
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            CliError::Runtime(RuntimeError::ShutdownRequested)
                | CliError::Runtime(RuntimeError::Job(JobError::Cancelled { .. }))
        )
    }
}
