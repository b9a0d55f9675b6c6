use crate::error::StreamLoadError;
use async_trait::async_trait;
use bytes::Bytes;
use model::core::identifiers::{Label, TaskId};
use serde::{Deserialize, Serialize};

/// How a load request is made visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// The request commits on its own under its own label.
    AutoCommit,
    /// The request joins the open transaction named by its label.
    Transaction,
}

/// One chunk upload.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub label: Label,
    pub mode: LoadMode,
    pub task_id: TaskId,
    pub sequence: u64,
    pub rows: usize,
    pub body: Bytes,
}

impl LoadRequest {
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Body returned by every stream-load endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResponse {
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
    #[serde(rename = "TxnId", default)]
    pub txn_id: Option<i64>,
    #[serde(rename = "NumberLoadedRows", default)]
    pub loaded_rows: Option<u64>,
    #[serde(rename = "NumberFilteredRows", default)]
    pub filtered_rows: Option<u64>,
    #[serde(rename = "LoadBytes", default)]
    pub load_bytes: Option<u64>,
}

impl LoadResponse {
    pub const STATUS_OK: &'static str = "OK";
    pub const STATUS_SUCCESS: &'static str = "Success";
    pub const STATUS_LABEL_EXISTS: &'static str = "Label Already Exists";

    pub fn ok(label: &Label) -> Self {
        Self {
            status: Self::STATUS_OK.to_string(),
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::STATUS_OK)
            || self.status.eq_ignore_ascii_case(Self::STATUS_SUCCESS)
    }

    pub fn is_label_collision(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::STATUS_LABEL_EXISTS)
    }

    /// Maps a non-success status onto the error taxonomy.
    pub fn into_result(self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        if self.is_success() {
            Ok(self)
        } else if self.is_label_collision() {
            Err(StreamLoadError::LabelAlreadyExists(label.to_string()))
        } else {
            Err(StreamLoadError::Rejected {
                label: label.to_string(),
                status: self.status,
                message: self.message,
            })
        }
    }
}

/// Boundary to the store's bulk-load protocol.
///
/// `load` is used in both modes; the transaction calls are only used when
/// the job runs transactionally.
#[async_trait]
pub trait StreamLoadClient: Send + Sync {
    async fn begin(&self, label: &Label) -> Result<LoadResponse, StreamLoadError>;

    async fn load(&self, request: &LoadRequest) -> Result<LoadResponse, StreamLoadError>;

    async fn prepare(&self, label: &Label) -> Result<LoadResponse, StreamLoadError>;

    async fn commit(&self, label: &Label) -> Result<LoadResponse, StreamLoadError>;

    async fn rollback(&self, label: &Label) -> Result<LoadResponse, StreamLoadError>;
}
