use crate::{error::ChunkFlushError, load::chunk::SealedChunk, retry::classify_stream_load_error};
use engine_core::{
    connectors::stream_load::{LoadMode, LoadRequest, LoadResponse, StreamLoadClient},
    error::StreamLoadError,
    label,
    metrics::LoadMetrics,
    retry::RetryPolicy,
};
use model::core::identifiers::{Label, TaskId};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closed,
    Aborted,
}

/// Result of one successful chunk upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    pub sequence: u64,
    pub label: Label,
    pub rows: usize,
    pub bytes: usize,
    pub attempts: usize,
    pub duration: Duration,
    pub loaded_rows: Option<u64>,
}

/// Everything a stream handle needs from its coordinator.
#[derive(Clone)]
pub struct StreamContext {
    pub client: Arc<dyn StreamLoadClient>,
    pub label: Label,
    pub mode: LoadMode,
    pub retry: RetryPolicy,
    pub attempt_timeout: Duration,
    pub metrics: LoadMetrics,
}

/// Upload session of one writer task under the job's label.
pub struct StreamHandle {
    task_id: TaskId,
    ctx: StreamContext,
    cancel: CancellationToken,
    state: StreamState,
    rows_written: u64,
    bytes_written: u64,
    chunks_written: u64,
    chunk_labels: Vec<Label>,
    last_flush: Option<FlushOutcome>,
}

impl StreamHandle {
    pub fn new(task_id: TaskId, ctx: StreamContext, cancel: CancellationToken) -> Self {
        Self {
            task_id,
            ctx,
            cancel,
            state: StreamState::Open,
            rows_written: 0,
            bytes_written: 0,
            chunks_written: 0,
            chunk_labels: Vec::new(),
            last_flush: None,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn label(&self) -> &Label {
        &self.ctx.label
    }

    pub fn mode(&self) -> LoadMode {
        self.ctx.mode
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Labels of the chunks committed on their own (auto-commit mode only).
    pub fn chunk_labels(&self) -> &[Label] {
        &self.chunk_labels
    }

    pub fn last_flush(&self) -> Option<&FlushOutcome> {
        self.last_flush.as_ref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Uploads one chunk, retrying transport failures per the retry policy.
    pub async fn flush(&mut self, chunk: SealedChunk) -> Result<FlushOutcome, ChunkFlushError> {
        let fail = |source: StreamLoadError, attempts: usize| ChunkFlushError {
            task_id: self.task_id,
            sequence: chunk.sequence,
            rows: chunk.rows,
            bytes: chunk.len(),
            attempts,
            source,
        };

        if self.state != StreamState::Open {
            return Err(fail(StreamLoadError::Closed, 0));
        }
        if self.cancel.is_cancelled() {
            return Err(fail(StreamLoadError::Cancelled, 0));
        }

        let label = match self.ctx.mode {
            LoadMode::AutoCommit => label::chunk_label(&self.ctx.label, self.task_id, chunk.sequence),
            LoadMode::Transaction => self.ctx.label.clone(),
        };
        let request = LoadRequest {
            label: label.clone(),
            mode: self.ctx.mode,
            task_id: self.task_id,
            sequence: chunk.sequence,
            rows: chunk.rows,
            body: chunk.body.clone(),
        };

        let client = Arc::clone(&self.ctx.client);
        let cancel = self.cancel.clone();
        let timeout = self.ctx.attempt_timeout;
        let metrics = self.ctx.metrics.clone();
        let task_id = self.task_id;
        let mut attempt = 0usize;
        let start = Instant::now();

        let result = self
            .ctx
            .retry
            .run_observed(
                || {
                    let client = Arc::clone(&client);
                    let cancel = cancel.clone();
                    let request = &request;
                    let retried = attempt > 0;
                    attempt += 1;
                    async move {
                        let response = tokio::select! {
                            _ = cancel.cancelled() => Err(StreamLoadError::Cancelled),
                            res = tokio::time::timeout(timeout, client.load(request)) => match res {
                                Ok(res) => res,
                                Err(_) => Err(StreamLoadError::Timeout {
                                    endpoint: "load".to_string(),
                                    elapsed_ms: timeout.as_millis() as u64,
                                }),
                            },
                        };
                        match response {
                            // An earlier attempt went through but its answer was lost.
                            Err(StreamLoadError::LabelAlreadyExists(existing))
                                if retried && request.mode == LoadMode::AutoCommit =>
                            {
                                debug!(label = %existing, "Chunk label already loaded by an earlier attempt");
                                Ok(LoadResponse::ok(&request.label))
                            }
                            other => other,
                        }
                    }
                },
                classify_stream_load_error,
                |attempt, err, delay| {
                    metrics.increment_retries(1);
                    warn!(
                        task_id = %task_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Chunk upload failed, retrying"
                    );
                },
            )
            .await;

        match result {
            Ok(response) => {
                let outcome = FlushOutcome {
                    sequence: chunk.sequence,
                    label: label.clone(),
                    rows: chunk.rows,
                    bytes: chunk.len(),
                    attempts: attempt,
                    duration: start.elapsed(),
                    loaded_rows: response.loaded_rows,
                };
                self.rows_written += chunk.rows as u64;
                self.bytes_written += chunk.len() as u64;
                self.chunks_written += 1;
                if self.ctx.mode == LoadMode::AutoCommit {
                    self.chunk_labels.push(label);
                }
                self.ctx
                    .metrics
                    .record_chunk(chunk.rows as u64, chunk.len() as u64);

                info!(
                    task_id = %self.task_id,
                    label = %outcome.label,
                    sequence = outcome.sequence,
                    rows = outcome.rows,
                    bytes = outcome.bytes,
                    attempts = outcome.attempts,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "Chunk loaded"
                );
                self.last_flush = Some(outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                self.ctx.metrics.increment_failures(1);
                let attempts = err.attempts();
                Err(fail(err.into_inner(), attempts))
            }
        }
    }

    pub fn close(&mut self) {
        if self.state == StreamState::Open {
            self.state = StreamState::Closed;
            debug!(
                task_id = %self.task_id,
                label = %self.ctx.label,
                rows = self.rows_written,
                chunks = self.chunks_written,
                "Stream closed"
            );
        }
    }

    /// Local abort: no further chunk is sent. Data already sent under a
    /// transaction is discarded by the coordinator's rollback.
    pub fn abort(&mut self) {
        if self.state != StreamState::Aborted {
            self.state = StreamState::Aborted;
            warn!(
                task_id = %self.task_id,
                label = %self.ctx.label,
                rows_written = self.rows_written,
                "Stream aborted"
            );
        }
    }
}
