use crate::{
    error::{JobError, TaskFailure, TaskFailureCause, TransactionError},
    load::{
        buffer::{ChunkBuffer, FlushLimits},
        encoder::RowEncoder,
        stream::{StreamContext, StreamHandle},
        writer::TaskWriter,
    },
    report::{JobSummary, TaskCommit, TaskReport},
};
use engine_config::LoadProperties;
use engine_core::{
    connectors::stream_load::{LoadMode, StreamLoadClient},
    error::StreamLoadError,
    label,
    metrics::LoadMetrics,
    retry::RetryPolicy,
};
use model::core::identifiers::{JobId, Label, TaskId};
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Begun,
    Preparing,
    Committed,
    Aborted,
}

/// One load attempt: its label, state and participating tasks.
#[derive(Debug, Clone)]
pub struct Transaction {
    label: Option<Label>,
    state: TransactionState,
    participants: BTreeSet<TaskId>,
    txn_id: Option<i64>,
}

impl Transaction {
    fn new() -> Self {
        Self {
            label: None,
            state: TransactionState::Idle,
            participants: BTreeSet::new(),
            txn_id: None,
        }
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn participants(&self) -> &BTreeSet<TaskId> {
        &self.participants
    }

    pub fn txn_id(&self) -> Option<i64> {
        self.txn_id
    }

    fn require(
        &self,
        operation: &'static str,
        expected: TransactionState,
    ) -> Result<Label, TransactionError> {
        match (&self.label, self.state == expected) {
            (Some(label), true) => Ok(label.clone()),
            _ => Err(TransactionError::InvalidState {
                operation,
                state: self.state,
            }),
        }
    }
}

/// Drives the load lifecycle of one job across all of its writer tasks.
///
/// Transactional jobs move `Idle -> Begun -> Preparing -> Committed`, or to
/// `Aborted` from `Begun`/`Preparing`. Non-transactional jobs only begin and
/// finish; every chunk commits on its own.
///
/// The caller provides the barrier: [`WriteCoordinator::finish`] is called
/// once every task has reported.
pub struct WriteCoordinator {
    job_id: JobId,
    props: Arc<LoadProperties>,
    client: Arc<dyn StreamLoadClient>,
    retry: RetryPolicy,
    metrics: LoadMetrics,
    cancel: CancellationToken,
    epoch: Option<u64>,
    txn: Mutex<Transaction>,
}

impl WriteCoordinator {
    pub fn new(
        job_id: JobId,
        props: Arc<LoadProperties>,
        client: Arc<dyn StreamLoadClient>,
    ) -> Self {
        Self {
            retry: RetryPolicy::for_requests(props.job().request_retries),
            job_id,
            props,
            client,
            metrics: LoadMetrics::new(),
            cancel: CancellationToken::new(),
            epoch: None,
            txn: Mutex::new(Transaction::new()),
        }
    }

    /// Scopes the label to one streaming epoch.
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_transactional(&self) -> bool {
        self.props.is_transactional()
    }

    pub fn metrics(&self) -> &LoadMetrics {
        &self.metrics
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn state(&self) -> TransactionState {
        self.txn.lock().await.state
    }

    pub async fn transaction(&self) -> Transaction {
        self.txn.lock().await.clone()
    }

    /// Starts the load under `label`, or under a generated one.
    ///
    /// In transactional mode the store must accept the label; a collision or
    /// an unreachable store fails the job before any data moves.
    pub async fn begin(&self, label: Option<String>) -> Result<Label, TransactionError> {
        let mut txn = self.txn.lock().await;
        if txn.state != TransactionState::Idle {
            return Err(TransactionError::InvalidState {
                operation: "begin",
                state: txn.state,
            });
        }

        let base = match label {
            Some(label) => label::validate(&label)?,
            None => label::generate(self.props.job().label_prefix.as_deref(), &self.job_id),
        };
        let label = match self.epoch {
            Some(epoch) => label::epoch_label(&base, epoch),
            None => base,
        };

        if self.is_transactional() {
            let begun = self.client.begin(&label).await;
            match begun {
                Ok(response) => txn.txn_id = response.txn_id,
                Err(StreamLoadError::LabelAlreadyExists(_)) => {
                    error!(label = %label, "Transaction label already exists");
                    return Err(TransactionError::LabelExists(label));
                }
                Err(source) => {
                    error!(label = %label, error = %source, "Failed to begin transaction");
                    return Err(TransactionError::Begin { label, source });
                }
            }
        }

        info!(
            job_id = %self.job_id,
            label = %label,
            txn_id = ?txn.txn_id,
            transactional = self.is_transactional(),
            "Load begun"
        );
        txn.label = Some(label.clone());
        txn.state = TransactionState::Begun;
        Ok(label)
    }

    /// Hands out the writer of `task_id`. Each task may join once.
    pub async fn create_writer(&self, task_id: TaskId) -> Result<TaskWriter, TransactionError> {
        let mut txn = self.txn.lock().await;
        let label = txn.require("create a writer", TransactionState::Begun)?;
        if !txn.participants.insert(task_id) {
            return Err(TransactionError::DuplicateTask(task_id));
        }

        let ctx = StreamContext {
            client: Arc::clone(&self.client),
            label,
            mode: if self.is_transactional() {
                LoadMode::Transaction
            } else {
                LoadMode::AutoCommit
            },
            retry: self.retry.clone(),
            attempt_timeout: self.props.attempt_timeout(),
            metrics: self.metrics.clone(),
        };
        let handle = StreamHandle::new(task_id, ctx, self.cancel.child_token());
        let table = self.props.table();
        let encoder = RowEncoder::new(&table.format, table.columns.as_deref());
        let buffer = ChunkBuffer::new(handle, encoder, self.flush_limits());

        debug!(task_id = %task_id, "Writer created");
        Ok(TaskWriter::new(task_id, buffer))
    }

    fn flush_limits(&self) -> FlushLimits {
        let job = self.props.job();
        FlushLimits {
            chunk_limit: usize::try_from(self.props.chunk_limit()).unwrap_or(usize::MAX),
            cache_max_bytes: job
                .cache_max_bytes
                .map(|bytes| usize::try_from(bytes).unwrap_or(usize::MAX)),
            expect_delay: job.expect_delay_time_ms.map(Duration::from_millis),
        }
    }

    /// Pre-commits every chunk loaded under the label. A store failure
    /// aborts the transaction.
    pub async fn prepare(&self) -> Result<(), TransactionError> {
        let mut txn = self.txn.lock().await;
        let label = txn.require("prepare", TransactionState::Begun)?;

        let prepared = if self.is_transactional() {
            self.client.prepare(&label).await.map(|_| ())
        } else {
            Ok(())
        };
        if let Err(source) = prepared {
            error!(label = %label, error = %source, "Failed to prepare transaction");
            self.abort_locked(&mut txn).await;
            return Err(TransactionError::Prepare { label, source });
        }

        info!(label = %label, "Transaction prepared");
        txn.state = TransactionState::Preparing;
        Ok(())
    }

    /// Makes the load visible. A rejected commit aborts and is never retried.
    pub async fn commit(&self) -> Result<(), TransactionError> {
        let mut txn = self.txn.lock().await;
        let label = txn.require("commit", TransactionState::Preparing)?;

        let committed = if self.is_transactional() {
            self.client.commit(&label).await.map(|_| ())
        } else {
            Ok(())
        };
        if let Err(source) = committed {
            error!(label = %label, error = %source, "Failed to commit transaction");
            self.abort_locked(&mut txn).await;
            return Err(TransactionError::Commit { label, source });
        }

        info!(label = %label, "Transaction committed");
        txn.state = TransactionState::Committed;
        Ok(())
    }

    /// Discards the load. Idempotent; a failed rollback is only logged and
    /// the store expires the label.
    pub async fn abort(&self) {
        let mut txn = self.txn.lock().await;
        self.abort_locked(&mut txn).await;
    }

    async fn abort_locked(&self, txn: &mut Transaction) {
        match txn.state {
            TransactionState::Aborted => {
                debug!(label = ?txn.label, "Transaction already aborted");
                return;
            }
            TransactionState::Committed => {
                warn!(label = ?txn.label, "Ignoring abort of a committed load");
                return;
            }
            TransactionState::Idle | TransactionState::Begun | TransactionState::Preparing => {}
        }

        self.cancel.cancel();
        if self.is_transactional()
            && let Some(label) = &txn.label
        {
            match self.client.rollback(label).await {
                Ok(_) => info!(label = %label, "Transaction rolled back"),
                Err(e) => warn!(label = %label, error = %e, "Rollback failed, label will expire"),
            }
        }
        txn.state = TransactionState::Aborted;
    }

    /// Job-level cancellation: stops every writer and aborts the label.
    pub async fn cancel(&self) {
        warn!(job_id = %self.job_id, "Load cancelled");
        self.cancel.cancel();
        self.abort().await;
    }

    /// Settles the job once every task has reported.
    ///
    /// Transactional: any failure aborts once and nothing is prepared;
    /// otherwise prepare then commit. Non-transactional: committed tasks stay
    /// visible and failures are reported as a partial failure.
    pub async fn finish(&self, reports: Vec<TaskReport>) -> Result<JobSummary, JobError> {
        let (label, participants) = {
            let mut txn = self.txn.lock().await;
            // A cancelled job may already have been aborted by `cancel`.
            if self.cancel.is_cancelled()
                && let Some(label) = txn.label.clone()
                && txn.state != TransactionState::Committed
            {
                self.abort_locked(&mut txn).await;
                return Err(JobError::Cancelled { label });
            }
            let label = txn.require("finish", TransactionState::Begun)?;
            (label, txn.participants.clone())
        };

        let mut commits: Vec<TaskCommit> = Vec::new();
        let mut failures: Vec<TaskFailure> = Vec::new();
        for report in reports {
            match report {
                Ok(commit) => commits.push(commit),
                Err(failure) => failures.push(failure),
            }
        }

        // A participant that never reported cannot be trusted to have flushed.
        let reported: BTreeSet<TaskId> = commits
            .iter()
            .map(|c| c.task_id)
            .chain(failures.iter().map(|f| f.task_id))
            .collect();
        failures.extend(participants.difference(&reported).map(|task_id| TaskFailure {
            task_id: *task_id,
            unwritten_rows: 0,
            cause: TaskFailureCause::Host("task did not report".to_string()),
        }));
        failures.sort_by_key(|f| f.task_id);

        if !self.is_transactional() {
            return self.finish_auto_commit(label, commits, failures).await;
        }

        if !failures.is_empty() {
            for failure in &failures {
                error!(label = %label, task_id = %failure.task_id, error = %failure.cause, "Task failed, aborting load");
            }
            self.metrics.increment_failures(failures.len() as u64);
            self.abort().await;
            return Err(JobError::TaskFailed { label, failures });
        }

        self.prepare().await?;
        self.commit().await?;
        Ok(self.summarize(label, &commits))
    }

    async fn finish_auto_commit(
        &self,
        label: Label,
        commits: Vec<TaskCommit>,
        failures: Vec<TaskFailure>,
    ) -> Result<JobSummary, JobError> {
        let mut txn = self.txn.lock().await;
        if failures.is_empty() {
            txn.state = TransactionState::Committed;
            drop(txn);
            return Ok(self.summarize(label, &commits));
        }

        txn.state = TransactionState::Aborted;
        let committed: Vec<TaskId> = commits.iter().map(|c| c.task_id).collect();
        warn!(
            label = %label,
            committed_tasks = committed.len(),
            failed_tasks = failures.len(),
            rows_visible = commits.iter().map(|c| c.rows).sum::<u64>(),
            "Load partially failed, committed chunks stay visible"
        );
        Err(JobError::PartialFailure {
            label,
            committed,
            failures,
        })
    }

    fn summarize(&self, label: Label, commits: &[TaskCommit]) -> JobSummary {
        let summary = JobSummary {
            label,
            transactional: self.is_transactional(),
            tasks: commits.len(),
            rows: commits.iter().map(|c| c.rows).sum(),
            bytes: commits.iter().map(|c| c.bytes).sum(),
            chunks: commits.iter().map(|c| c.chunks).sum(),
            metrics: self.metrics.snapshot(),
        };
        info!(
            label = %summary.label,
            tasks = summary.tasks,
            rows = summary.rows,
            bytes = summary.bytes,
            chunks = summary.chunks,
            retries = summary.metrics.retry_count,
            "Load committed"
        );
        summary
    }
}
