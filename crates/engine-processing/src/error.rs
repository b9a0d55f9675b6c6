use engine_config::ConfigError;
use engine_core::error::{LabelError, StreamLoadError};
use model::core::identifiers::{Label, TaskId};
use planner::error::PlanError;
use thiserror::Error;

use crate::coordinator::TransactionState;

/// One chunk could not be loaded, either because the store rejected it or
/// because every retry failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "Flush of chunk {sequence} for task {task_id} ({rows} rows, {bytes} bytes) failed after {attempts} attempt(s): {source}"
)]
pub struct ChunkFlushError {
    pub task_id: TaskId,
    pub sequence: u64,
    pub rows: usize,
    pub bytes: usize,
    pub attempts: usize,
    #[source]
    pub source: StreamLoadError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskFailureCause {
    #[error(transparent)]
    Flush(#[from] ChunkFlushError),

    #[error("Failed to encode row: {0}")]
    Encode(String),

    #[error("Task was cancelled")]
    Cancelled,

    #[error("Stream handle is closed")]
    Closed,

    /// The host lost the task (panic, lost executor).
    #[error("Task did not complete: {0}")]
    Host(String),
}

/// A writer task could not complete its chunk stream.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Task {task_id} failed with {unwritten_rows} row(s) not written: {cause}")]
pub struct TaskFailure {
    pub task_id: TaskId,
    /// Rows handed to the task that the store never acknowledged.
    pub unwritten_rows: u64,
    #[source]
    pub cause: TaskFailureCause,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error(transparent)]
    InvalidLabel(#[from] LabelError),

    #[error("Label '{0}' already exists; restart the job with a new label")]
    LabelExists(Label),

    #[error("Failed to begin transaction '{label}': {source}")]
    Begin {
        label: Label,
        #[source]
        source: StreamLoadError,
    },

    #[error("Failed to prepare transaction '{label}': {source}")]
    Prepare {
        label: Label,
        #[source]
        source: StreamLoadError,
    },

    #[error("Failed to commit transaction '{label}': {source}")]
    Commit {
        label: Label,
        #[source]
        source: StreamLoadError,
    },

    #[error("Cannot {operation} while transaction is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: TransactionState,
    },

    #[error("Task {0} already has a writer")]
    DuplicateTask(TaskId),
}

/// Job-level outcome surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Load '{label}' aborted, failed task(s) {}: {}", task_list(.failures), first_cause(.failures))]
    TaskFailed {
        label: Label,
        failures: Vec<TaskFailure>,
    },

    /// Non-transactional loads keep what the committed tasks wrote.
    #[error(
        "Load '{label}' partially failed: {} task(s) committed, failed task(s) {}: {}",
        .committed.len(),
        task_list(.failures),
        first_cause(.failures)
    )]
    PartialFailure {
        label: Label,
        committed: Vec<TaskId>,
        failures: Vec<TaskFailure>,
    },

    #[error("Load '{label}' was cancelled")]
    Cancelled { label: Label },
}

impl JobError {
    pub fn failed_tasks(&self) -> Vec<TaskId> {
        match self {
            JobError::TaskFailed { failures, .. } | JobError::PartialFailure { failures, .. } => {
                failures.iter().map(|f| f.task_id).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn task_list(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(|f| f.task_id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_cause(failures: &[TaskFailure]) -> String {
    failures
        .first()
        .map(|f| f.cause.to_string())
        .unwrap_or_default()
}
