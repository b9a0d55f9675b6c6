use crate::{
    error::{TaskFailure, TaskFailureCause},
    load::buffer::ChunkBuffer,
    report::{TaskCommit, TaskReport},
};
use model::{
    core::identifiers::{Label, TaskId},
    records::row::RowData,
};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-task writer handed out by the coordinator. Owns the task's buffer and
/// stream handle; never shared with another task.
pub struct TaskWriter {
    task_id: TaskId,
    buffer: ChunkBuffer,
    rows_accepted: u64,
    started: Instant,
    failure: Option<TaskFailure>,
}

impl TaskWriter {
    pub(crate) fn new(task_id: TaskId, buffer: ChunkBuffer) -> Self {
        Self {
            task_id,
            buffer,
            rows_accepted: 0,
            started: Instant::now(),
            failure: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn label(&self) -> &Label {
        self.buffer.handle().label()
    }

    /// Cancels this task only.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.buffer.handle().cancellation_token().clone()
    }

    pub fn rows_accepted(&self) -> u64 {
        self.rows_accepted
    }

    /// Buffers one row, flushing first when the chunk is full. After the
    /// first failure every call returns that failure.
    pub async fn write(&mut self, row: &RowData) -> Result<(), TaskFailure> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        if self.buffer.handle().cancellation_token().is_cancelled() {
            return Err(self.fail(TaskFailureCause::Cancelled));
        }

        self.rows_accepted += 1;
        match self.buffer.append(row).await {
            Ok(()) => Ok(()),
            Err(cause) => Err(self.fail(cause)),
        }
    }

    /// Flushes what is left and reports the task's contribution.
    pub async fn commit(mut self) -> TaskReport {
        if let Some(failure) = self.failure.take() {
            return Err(failure);
        }
        if self.buffer.handle().cancellation_token().is_cancelled() {
            return Err(self.fail(TaskFailureCause::Cancelled));
        }
        if let Err(err) = self.buffer.close().await {
            return Err(self.fail(err.into()));
        }

        let handle = self.buffer.handle();
        let commit = TaskCommit {
            task_id: self.task_id,
            label: handle.label().clone(),
            rows: handle.rows_written(),
            bytes: handle.bytes_written(),
            chunks: handle.chunks_written(),
            chunk_labels: handle.chunk_labels().to_vec(),
            duration: self.started.elapsed(),
        };
        info!(
            task_id = %commit.task_id,
            label = %commit.label,
            rows = commit.rows,
            bytes = commit.bytes,
            chunks = commit.chunks,
            duration_ms = commit.duration.as_millis() as u64,
            "Task finished"
        );
        Ok(commit)
    }

    /// Discards buffered rows and stops the stream without touching the
    /// store; the coordinator decides what happens to the label.
    pub fn abort(mut self) -> TaskFailure {
        match self.failure.take() {
            Some(failure) => failure,
            None => self.fail(TaskFailureCause::Cancelled),
        }
    }

    /// Writes every row and commits, or reports the first failure.
    pub async fn write_all<I>(mut self, rows: I) -> TaskReport
    where
        I: IntoIterator<Item = RowData>,
    {
        for row in rows {
            if let Err(failure) = self.write(&row).await {
                return Err(failure);
            }
        }
        self.commit().await
    }

    fn fail(&mut self, cause: TaskFailureCause) -> TaskFailure {
        let dropped = self.buffer.abort();
        let failure = TaskFailure {
            task_id: self.task_id,
            unwritten_rows: self
                .rows_accepted
                .saturating_sub(self.buffer.handle().rows_written()),
            cause,
        };
        warn!(
            task_id = %self.task_id,
            label = %self.buffer.handle().label(),
            buffered_rows_dropped = dropped,
            unwritten_rows = failure.unwritten_rows,
            error = %failure.cause,
            "Task failed"
        );
        self.failure = Some(failure.clone());
        failure
    }
}
