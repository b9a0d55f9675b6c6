use connectors::error::ClientError;
use engine_processing::error::{JobError, TransactionError};
use thiserror::Error;

/// Top-level errors of a load run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The stream-load client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Shutdown requested before the load began")]
    ShutdownRequested,
}

impl From<TransactionError> for RuntimeError {
    fn from(err: TransactionError) -> Self {
        RuntimeError::Job(JobError::Transaction(err))
    }
}
