use crate::{error::RuntimeError, execution::partitioner::Partitioner};
use engine_core::connectors::stream_load::StreamLoadClient;
use engine_processing::{
    JobSummary, LoadWrite, TaskReport, TaskWriter, WriteCoordinator,
    error::{TaskFailure, TaskFailureCause},
};
use futures::future::join_all;
use model::{
    core::identifiers::{JobId, TaskId},
    records::row::RowData,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Rows buffered between the router and each writer task.
const TASK_QUEUE_DEPTH: usize = 1024;

/// Identity of one run of a load job.
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub job_id: JobId,
    /// Label supplied by the caller; generated when absent.
    pub label: Option<String>,
    /// Task count used when the write leaves the distribution open.
    pub default_parallelism: usize,
}

/// Runs one batch load: begin, route rows into one writer task per
/// partition, wait for all of them, then let the coordinator settle.
pub async fn run<I>(
    write: &LoadWrite,
    job: LoadJob,
    rows: I,
    client: Arc<dyn StreamLoadClient>,
    cancel: CancellationToken,
) -> Result<JobSummary, RuntimeError>
where
    I: IntoIterator<Item = RowData>,
{
    LoadExecutor::new(write, job, client, cancel)
        .execute(rows)
        .await
}

struct LoadExecutor {
    job: LoadJob,
    coordinator: WriteCoordinator,
    partitioner: Partitioner,
    cancel: CancellationToken,
}

impl LoadExecutor {
    fn new(
        write: &LoadWrite,
        job: LoadJob,
        client: Arc<dyn StreamLoadClient>,
        cancel: CancellationToken,
    ) -> Self {
        let coordinator = write
            .to_batch()
            .create_coordinator(job.job_id.clone(), client);
        let partitioner = Partitioner::new(write.required_distribution(), job.default_parallelism);
        Self {
            job,
            coordinator,
            partitioner,
            cancel,
        }
    }

    async fn execute<I>(mut self, rows: I) -> Result<JobSummary, RuntimeError>
    where
        I: IntoIterator<Item = RowData>,
    {
        if self.cancel.is_cancelled() {
            warn!(job_id = %self.job.job_id, "Shutdown requested before the load began");
            return Err(RuntimeError::ShutdownRequested);
        }

        let label = self.coordinator.begin(self.job.label.clone()).await?;
        let partitions = self.partitioner.partitions();
        info!(
            job_id = %self.job.job_id,
            label = %label,
            partitions,
            "Starting writer tasks"
        );

        let mut senders = Vec::with_capacity(partitions);
        let mut handles = Vec::with_capacity(partitions);
        for idx in 0..partitions {
            let task_id = TaskId(idx);
            let writer = match self.coordinator.create_writer(task_id).await {
                Ok(writer) => writer,
                Err(err) => {
                    self.coordinator.abort().await;
                    return Err(err.into());
                }
            };
            let (tx, rx) = mpsc::channel(TASK_QUEUE_DEPTH);
            senders.push(tx);
            handles.push(tokio::spawn(run_task(writer, rx)));
        }

        let routed = self.route(rows, &senders).await;
        drop(senders);
        info!(job_id = %self.job.job_id, rows = routed, "All rows routed");

        let joined = join_all(handles);
        tokio::pin!(joined);
        let results = tokio::select! {
            results = &mut joined => results,
            _ = self.cancel.cancelled() => {
                self.coordinator.cancel().await;
                joined.await
            }
        };

        let reports: Vec<TaskReport> = results
            .into_iter()
            .enumerate()
            .map(|(idx, result)| {
                result.unwrap_or_else(|e| {
                    error!(task_id = idx, error = %e, "Writer task did not complete");
                    Err(TaskFailure {
                        task_id: TaskId(idx),
                        unwritten_rows: 0,
                        cause: TaskFailureCause::Host(e.to_string()),
                    })
                })
            })
            .collect();

        Ok(self.coordinator.finish(reports).await?)
    }

    /// Sends each row to its partition's task. Stops early on cancellation;
    /// rows for a task that already failed are counted by that task.
    async fn route<I>(&mut self, rows: I, senders: &[mpsc::Sender<RowData>]) -> u64
    where
        I: IntoIterator<Item = RowData>,
    {
        let mut routed = 0u64;
        for row in rows {
            if self.cancel.is_cancelled() {
                warn!(job_id = %self.job.job_id, routed, "Shutdown requested, no more rows routed");
                self.coordinator.cancel().await;
                break;
            }
            let partition = self.partitioner.partition_for(&row);
            if senders[partition].send(row).await.is_err() {
                warn!(partition, "Writer task is gone, row not routed");
            }
            routed += 1;
        }
        routed
    }
}

/// Body of one writer task. After a failure the queue is drained so the
/// failure accounts for every row routed to this task.
async fn run_task(mut writer: TaskWriter, mut rx: mpsc::Receiver<RowData>) -> TaskReport {
    while let Some(row) = rx.recv().await {
        if let Err(mut failure) = writer.write(&row).await {
            let mut skipped = 0u64;
            while rx.recv().await.is_some() {
                skipped += 1;
            }
            failure.unwritten_rows += skipped;
            return Err(failure);
        }
    }
    writer.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_config::resolve;
    use engine_core::{
        connectors::stream_load::{LoadRequest, LoadResponse},
        error::StreamLoadError,
    };
    use engine_processing::error::JobError;
    use model::{
        core::{
            identifiers::Label,
            value::{FieldValue, Value},
        },
        records::schema::Schema,
    };
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        loads: Mutex<Vec<(TaskId, usize, String)>>,
        commits: Mutex<usize>,
        rollbacks: Mutex<usize>,
        failing_task: Option<TaskId>,
    }

    #[async_trait]
    impl StreamLoadClient for RecordingClient {
        async fn begin(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
            Ok(LoadResponse::ok(label))
        }

        async fn load(&self, request: &LoadRequest) -> Result<LoadResponse, StreamLoadError> {
            if Some(request.task_id) == self.failing_task {
                return Err(StreamLoadError::Rejected {
                    label: request.label.to_string(),
                    status: "Fail".into(),
                    message: "too many filtered rows".into(),
                });
            }
            self.loads.lock().unwrap().push((
                request.task_id,
                request.rows,
                String::from_utf8_lossy(&request.body).into_owned(),
            ));
            Ok(LoadResponse::ok(&request.label))
        }

        async fn prepare(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
            Ok(LoadResponse::ok(label))
        }

        async fn commit(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
            *self.commits.lock().unwrap() += 1;
            Ok(LoadResponse::ok(label))
        }

        async fn rollback(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
            *self.rollbacks.lock().unwrap() += 1;
            Ok(LoadResponse::ok(label))
        }
    }

    fn load_write(extra: &[(&str, &str)]) -> LoadWrite {
        let mut options = extra.to_vec();
        options.extend([
            ("fe.http.url", "fe:8030"),
            ("database", "db"),
            ("table", "tbl"),
            ("request.retries", "0"),
        ]);
        let config = resolve(options).as_write_config().unwrap();
        LoadWrite::new(config, &Schema::new(["id", "region"])).unwrap()
    }

    fn rows(n: i64) -> Vec<RowData> {
        (0..n)
            .map(|i| {
                RowData::new(vec![
                    FieldValue::new("id", Value::Int(i)),
                    FieldValue::new("region", Value::String(format!("r{}", i % 3))),
                ])
            })
            .collect()
    }

    fn job(parallelism: usize) -> LoadJob {
        LoadJob {
            job_id: JobId::new("job-1"),
            label: Some("run_1".into()),
            default_parallelism: parallelism,
        }
    }

    #[tokio::test]
    async fn test_transactional_run_commits_once() {
        let write = load_write(&[
            ("write.ctl.enable-transaction", "true"),
            ("write.num.partitions", "3"),
            ("write.partition.columns", "region"),
        ]);
        let client = Arc::new(RecordingClient::default());

        let summary = run(&write, job(1), rows(30), client.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.label.as_str(), "run_1");
        assert_eq!(summary.rows, 30);
        assert_eq!(*client.commits.lock().unwrap(), 1);
        assert_eq!(*client.rollbacks.lock().unwrap(), 0);

        // Every region lands in exactly one task.
        let loads = client.loads.lock().unwrap();
        for region in ["r0", "r1", "r2"] {
            let needle = format!("\"region\":\"{region}\"");
            let tasks: std::collections::BTreeSet<_> = loads
                .iter()
                .filter(|(_, _, body)| body.contains(&needle))
                .map(|(task, _, _)| *task)
                .collect();
            assert_eq!(tasks.len(), 1, "{region} spread over {tasks:?}");
        }
    }

    #[tokio::test]
    async fn test_failed_task_aborts_whole_load() {
        let write = load_write(&[("write.ctl.enable-transaction", "true")]);
        let client = Arc::new(RecordingClient {
            failing_task: Some(TaskId(1)),
            ..Default::default()
        });

        let err = run(&write, job(2), rows(10), client.clone(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            RuntimeError::Job(JobError::TaskFailed { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].task_id, TaskId(1));
                assert_eq!(failures[0].unwritten_rows, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(*client.commits.lock().unwrap(), 0);
        assert_eq!(*client.rollbacks.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let write = load_write(&[]);
        let client = Arc::new(RecordingClient::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run(&write, job(1), rows(3), client.clone(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ShutdownRequested));
        assert!(client.loads.lock().unwrap().is_empty());
    }
}
