use engine_config::resolve;
use engine_processing::{JobSummary, LoadWrite};
use engine_runtime::{
    LoadJob, error::RuntimeError, execution::factory::create_client, run,
};
use model::{
    core::{
        identifiers::JobId,
        value::{FieldValue, Value},
    },
    records::{row::RowData, schema::Schema},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// One request as the mock store received it. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl StoreRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn is_load(&self) -> bool {
        self.path.ends_with("/_stream_load") || self.path == "/api/transaction/load"
    }

    /// `begin`, `load`, `prepare`, `commit`, `rollback` or `stream_load`.
    pub fn operation(&self) -> &str {
        if self.path.ends_with("/_stream_load") {
            "stream_load"
        } else {
            self.path.rsplit('/').next().unwrap_or_default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreReply {
    pub status: u16,
    pub body: String,
}

impl StoreReply {
    pub fn ok() -> Self {
        Self {
            status: 200,
            body: r#"{"Status":"OK","TxnId":42}"#.into(),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            status: 200,
            body: format!(r#"{{"Status":"Fail","Message":"{message}"}}"#),
        }
    }

    pub fn label_exists() -> Self {
        Self {
            status: 200,
            body: r#"{"Status":"Label Already Exists"}"#.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: 503,
            body: "backend busy".into(),
        }
    }
}

type Responder = dyn Fn(&StoreRequest) -> StoreReply + Send + Sync;

/// In-process stand-in for the store's HTTP load API. Every request is
/// recorded and answered by the scripted responder.
pub struct MockStore {
    endpoint: String,
    requests: Arc<Mutex<Vec<StoreRequest>>>,
    server: JoinHandle<()>,
}

impl MockStore {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&StoreRequest) -> StoreReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock store");
        let port = listener.local_addr().expect("mock store address").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let responder: Arc<Responder> = Arc::new(responder);

        let recorded = Arc::clone(&requests);
        let server = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let responder = Arc::clone(&responder);
                tokio::spawn(async move {
                    serve_connection(socket, recorded, responder).await;
                });
            }
        });

        Self {
            endpoint: format!("127.0.0.1:{port}"),
            requests,
            server,
        }
    }

    pub async fn healthy() -> Self {
        Self::start(|_| StoreReply::ok()).await
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn requests(&self) -> Vec<StoreRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<StoreRequest> {
        self.requests().into_iter().filter(|r| r.is_load()).collect()
    }

    /// Transaction-level calls in arrival order, loads excluded.
    pub fn transaction_calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| !r.is_load())
            .map(|r| r.operation().to_string())
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.operation() == operation)
            .count()
    }
}

impl Drop for MockStore {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    recorded: Arc<Mutex<Vec<StoreRequest>>>,
    responder: Arc<Responder>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let reply = responder(&request);
    recorded.lock().unwrap().push(request);

    let response = format!(
        "HTTP/1.1 {} MOCK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reply.status,
        reply.body.len(),
        reply.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<StoreRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let mut lines = head.lines();
            let mut request_line = lines.next()?.split_whitespace();
            let method = request_line.next()?.to_string();
            let path = request_line.next()?.to_string();
            let headers: HashMap<String, String> = lines
                .filter_map(|line| line.split_once(':'))
                .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
                .collect();
            let length = headers
                .get("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);

            if buf.len() >= end + 4 + length || n == 0 {
                let body_end = (end + 4 + length).min(buf.len());
                return Some(StoreRequest {
                    method,
                    path,
                    headers,
                    body: String::from_utf8_lossy(&buf[end + 4..body_end]).to_string(),
                });
            }
        }
        if n == 0 {
            return None;
        }
    }
}

/// Write config aimed at `store`, table `db.tbl`, with short timeouts.
pub fn load_write(endpoints: &str, extra: &[(&str, &str)]) -> LoadWrite {
    let mut options = extra.to_vec();
    options.extend([
        ("fe.http.url", endpoints),
        ("database", "db"),
        ("table", "tbl"),
        ("user", "root"),
        ("request.connect.timeout.ms", "2000"),
        ("request.socket.timeout.ms", "2000"),
    ]);
    let config = resolve(options).as_write_config().expect("write config");
    LoadWrite::new(config, &schema()).expect("load write")
}

pub fn schema() -> Schema {
    Schema::new(["id", "name"])
}

/// `n` rows `{id: i, name: "row-i"}`.
pub fn rows(n: i64) -> Vec<RowData> {
    (0..n)
        .map(|i| {
            RowData::new(vec![
                FieldValue::new("id", Value::Int(i)),
                FieldValue::new("name", Value::String(format!("row-{i}"))),
            ])
        })
        .collect()
}

pub fn job(label: &str, parallelism: usize) -> LoadJob {
    LoadJob {
        job_id: JobId::new("it-job"),
        label: Some(label.to_string()),
        default_parallelism: parallelism,
    }
}

/// Runs a load through the HTTP client, the way the CLI does.
pub async fn run_load(
    write: &LoadWrite,
    job: LoadJob,
    rows: Vec<RowData>,
    cancel: CancellationToken,
) -> Result<JobSummary, RuntimeError> {
    let client = create_client(write.load_properties())?;
    run(write, job, rows, client, cancel).await
}
