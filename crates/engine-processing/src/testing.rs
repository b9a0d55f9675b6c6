use async_trait::async_trait;
use engine_config::{LoadProperties, resolve};
use engine_core::{
    connectors::stream_load::{LoadRequest, LoadResponse, StreamLoadClient},
    error::StreamLoadError,
};
use model::core::identifiers::{Label, TaskId};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin(String),
    Load {
        label: String,
        task_id: TaskId,
        rows: usize,
        body: Vec<u8>,
    },
    Prepare(String),
    Commit(String),
    Rollback(String),
}

/// Records every call; failures are scripted per operation.
#[derive(Default)]
pub struct MockClient {
    pub calls: Mutex<Vec<Call>>,
    pub failing_tasks: Mutex<HashMap<TaskId, StreamLoadError>>,
    pub transient_load_failures: AtomicUsize,
    pub begin_error: Mutex<Option<StreamLoadError>>,
    pub commit_error: Mutex<Option<StreamLoadError>>,
    pub rollback_error: Mutex<Option<StreamLoadError>>,
}

impl MockClient {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Load { .. }))
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(label: &Label, scripted: &Mutex<Option<StreamLoadError>>) -> Result<LoadResponse, StreamLoadError> {
        match scripted.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(LoadResponse::ok(label)),
        }
    }
}

#[async_trait]
impl StreamLoadClient for MockClient {
    async fn begin(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.record(Call::Begin(label.to_string()));
        Self::answer(label, &self.begin_error)
    }

    async fn load(&self, request: &LoadRequest) -> Result<LoadResponse, StreamLoadError> {
        self.record(Call::Load {
            label: request.label.to_string(),
            task_id: request.task_id,
            rows: request.rows,
            body: request.body.to_vec(),
        });
        if let Some(err) = self.failing_tasks.lock().unwrap().get(&request.task_id) {
            return Err(err.clone());
        }
        let transient = self
            .transient_load_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if transient.is_ok() {
            return Err(StreamLoadError::Io {
                endpoint: "mock".into(),
                message: "connection reset".into(),
            });
        }
        Ok(LoadResponse::ok(&request.label))
    }

    async fn prepare(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.record(Call::Prepare(label.to_string()));
        Ok(LoadResponse::ok(label))
    }

    async fn commit(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.record(Call::Commit(label.to_string()));
        Self::answer(label, &self.commit_error)
    }

    async fn rollback(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.record(Call::Rollback(label.to_string()));
        Self::answer(label, &self.rollback_error)
    }
}

/// Load properties for `db.tbl` with fast retries.
pub fn props(extra: &[(&str, &str)]) -> Arc<LoadProperties> {
    let mut options = extra.to_vec();
    options.extend([
        ("fe.http.url", "fe:8030"),
        ("database", "db"),
        ("table", "tbl"),
        ("request.retries", "2"),
    ]);
    let config = resolve(options).as_write_config().unwrap();
    Arc::new(LoadProperties::try_from(&config).unwrap())
}
