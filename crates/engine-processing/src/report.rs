use crate::error::TaskFailure;
use engine_core::metrics::LoadMetricsSnapshot;
use model::core::identifiers::{Label, TaskId};
use serde::Serialize;
use std::time::Duration;

/// What a writer task reports to the coordinator once its rows are flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCommit {
    pub task_id: TaskId,
    pub label: Label,
    pub rows: u64,
    pub bytes: u64,
    pub chunks: u64,
    /// Labels committed on their own; empty in transactional mode.
    pub chunk_labels: Vec<Label>,
    pub duration: Duration,
}

pub type TaskReport = Result<TaskCommit, TaskFailure>;

/// Outcome of a load job that became fully visible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub label: Label,
    pub transactional: bool,
    pub tasks: usize,
    pub rows: u64,
    pub bytes: u64,
    pub chunks: u64,
    pub metrics: LoadMetricsSnapshot,
}
