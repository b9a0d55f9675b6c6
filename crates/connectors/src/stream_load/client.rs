use crate::{
    error::ClientError,
    stream_load::{
        endpoints::EndpointRing,
        headers::{self, HEADER_LABEL},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use engine_config::LoadProperties;
use engine_core::{
    connectors::stream_load::{LoadMode, LoadRequest, LoadResponse, StreamLoadClient},
    error::StreamLoadError,
};
use model::core::identifiers::Label;
use reqwest::{
    Method,
    header::{HeaderMap, LOCATION},
    redirect::Policy,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// FE nodes answer load requests with a redirect to a BE node.
const MAX_REDIRECTS: usize = 3;

/// `reqwest`-backed client for the store's stream-load HTTP API.
///
/// At most `ioThreadCount` requests are in flight per client; a connection
/// failure moves on to the next configured endpoint.
pub struct HttpStreamLoadClient {
    http: reqwest::Client,
    props: Arc<LoadProperties>,
    endpoints: EndpointRing,
    load_headers: HeaderMap,
    permits: Semaphore,
}

impl HttpStreamLoadClient {
    pub fn new(props: Arc<LoadProperties>) -> Result<Self, ClientError> {
        // Redirects are followed by hand so credentials reach the BE node.
        let http = reqwest::Client::builder()
            .connect_timeout(props.connect_timeout())
            .timeout(props.attempt_timeout())
            .redirect(Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            endpoints: EndpointRing::new(&props.job().load_urls)?,
            load_headers: headers::load_headers(&props)?,
            permits: Semaphore::new(props.job().io_thread_count),
            http,
            props,
        })
    }

    fn stream_load_path(&self) -> String {
        format!(
            "/api/{}/{}/_stream_load",
            self.props.table().database,
            self.props.table().table
        )
    }

    fn transaction_path(op: &str) -> String {
        format!("/api/transaction/{op}")
    }

    fn header_error(err: ClientError) -> StreamLoadError {
        StreamLoadError::Protocol(err.to_string())
    }

    async fn transaction_call(
        &self,
        op: &str,
        label: &Label,
    ) -> Result<LoadResponse, StreamLoadError> {
        let headers = headers::transaction_headers(&self.props, label.as_str())
            .map_err(Self::header_error)?;
        self.send(Method::POST, &Self::transaction_path(op), headers, None, label)
            .await
    }

    /// Sends one request, moving through the endpoints on connection failure
    /// until each was tried once.
    async fn send(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
        label: &Label,
    ) -> Result<LoadResponse, StreamLoadError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StreamLoadError::Closed)?;

        let mut last_error = None;
        for (idx, endpoint) in self.endpoints.rotation() {
            let url = format!("{endpoint}{path}");
            match self.send_to(&method, url, &headers, body.as_ref()).await {
                Ok(response) => return response.into_result(label),
                Err(err @ StreamLoadError::Io { .. }) => {
                    warn!(endpoint, label = %label, error = %err, "Load endpoint unreachable");
                    self.endpoints.mark_failed(idx);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or(StreamLoadError::Closed))
    }

    async fn send_to(
        &self,
        method: &Method,
        mut url: String,
        headers: &HeaderMap,
        body: Option<&Bytes>,
    ) -> Result<LoadResponse, StreamLoadError> {
        for _ in 0..=MAX_REDIRECTS {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .headers(headers.clone());
            if let Some(user) = &self.props.job().username {
                request = request.basic_auth(user, self.props.job().password.as_ref());
            }
            if let Some(body) = body {
                request = request.body(body.clone());
            }

            let response = request
                .send()
                .await
                .map_err(|e| self.transport_error(&url, e))?;
            let status = response.status();

            if status.is_redirection()
                && let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
            {
                debug!(from = %url, to = location, "Following load redirect");
                url = location.to_string();
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| self.transport_error(&url, e))?;
            if !status.is_success() {
                return Err(StreamLoadError::Http {
                    endpoint: url,
                    status: status.as_u16(),
                    body: text,
                });
            }
            return serde_json::from_str::<LoadResponse>(&text)
                .map_err(|e| StreamLoadError::Protocol(format!("{e}: {text}")));
        }

        Err(StreamLoadError::Protocol(format!(
            "more than {MAX_REDIRECTS} redirects, last to {url}"
        )))
    }

    /// Failures before a connection is established, connect timeouts
    /// included, map to `Io` so the request moves on to the next endpoint.
    fn transport_error(&self, endpoint: &str, err: reqwest::Error) -> StreamLoadError {
        if err.is_connect() {
            StreamLoadError::Io {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else if err.is_timeout() {
            StreamLoadError::Timeout {
                endpoint: endpoint.to_string(),
                elapsed_ms: self.props.attempt_timeout().as_millis() as u64,
            }
        } else {
            StreamLoadError::Io {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl StreamLoadClient for HttpStreamLoadClient {
    async fn begin(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.transaction_call("begin", label).await
    }

    async fn load(&self, request: &LoadRequest) -> Result<LoadResponse, StreamLoadError> {
        let mut headers = self.load_headers.clone();
        let path = match request.mode {
            LoadMode::AutoCommit => {
                headers::insert(&mut headers, HEADER_LABEL, request.label.as_str())
                    .map_err(Self::header_error)?;
                self.stream_load_path()
            }
            LoadMode::Transaction => {
                headers.extend(
                    headers::transaction_headers(&self.props, request.label.as_str())
                        .map_err(Self::header_error)?,
                );
                Self::transaction_path("load")
            }
        };

        debug!(
            label = %request.label,
            task_id = %request.task_id,
            sequence = request.sequence,
            rows = request.rows,
            bytes = request.len(),
            "Sending load request"
        );
        self.send(
            Method::PUT,
            &path,
            headers,
            Some(request.body.clone()),
            &request.label,
        )
        .await
    }

    async fn prepare(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.transaction_call("prepare", label).await
    }

    async fn commit(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.transaction_call("commit", label).await
    }

    async fn rollback(&self, label: &Label) -> Result<LoadResponse, StreamLoadError> {
        self.transaction_call("rollback", label).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::resolve;
    use model::core::identifiers::TaskId;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::mpsc,
    };

    /// Accepts one connection per canned body, answers it and reports the
    /// request head it received.
    async fn serve(bodies: Vec<&'static str>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let head = read_request(&mut socket).await;
                tx.send(head).unwrap();
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("127.0.0.1:{}", addr.port()), rx)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let head = text[..end].to_lowercase();
                let length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length || n == 0 {
                    return text;
                }
            }
            if n == 0 {
                return text;
            }
        }
    }

    async fn unused_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("127.0.0.1:{port}")
    }

    fn client(urls: &str, extra: &[(&str, &str)]) -> HttpStreamLoadClient {
        let mut options = extra.to_vec();
        options.extend([
            ("fe.http.url", urls),
            ("database", "db"),
            ("table", "tbl"),
            ("user", "root"),
            ("request.connect.timeout.ms", "2000"),
            ("request.socket.timeout.ms", "2000"),
        ]);
        let config = resolve(options).as_write_config().unwrap();
        let props = LoadProperties::try_from(&config).unwrap();
        HttpStreamLoadClient::new(Arc::new(props)).unwrap()
    }

    fn request(mode: LoadMode) -> LoadRequest {
        LoadRequest {
            label: Label::new("job-1"),
            mode,
            task_id: TaskId(0),
            sequence: 0,
            rows: 2,
            body: Bytes::from_static(br#"[{"id":1},{"id":2}]"#),
        }
    }

    #[tokio::test]
    async fn test_auto_commit_load_request() {
        let (endpoint, mut seen) =
            serve(vec![r#"{"Status":"Success","Label":"job-1","NumberLoadedRows":2}"#]).await;
        let client = client(&endpoint, &[]);

        let response = client.load(&request(LoadMode::AutoCommit)).await.unwrap();
        assert_eq!(response.loaded_rows, Some(2));

        let head = seen.recv().await.unwrap().to_lowercase();
        assert!(head.starts_with("put /api/db/tbl/_stream_load http/1.1"));
        assert!(head.contains("label: job-1"));
        assert!(head.contains("format: json"));
        assert!(head.contains("strip_outer_array: true"));
        assert!(head.contains("authorization: basic"));
        assert!(head.contains(r#"[{"id":1},{"id":2}]"#));
    }

    #[tokio::test]
    async fn test_transaction_calls_use_transaction_api() {
        let (endpoint, mut seen) = serve(vec![
            r#"{"Status":"OK","TxnId":7}"#,
            r#"{"Status":"OK"}"#,
        ])
        .await;
        let client = client(&endpoint, &[("write.ctl.enable-transaction", "true")]);
        let label = Label::new("job-1");

        assert_eq!(client.begin(&label).await.unwrap().txn_id, Some(7));
        let head = seen.recv().await.unwrap().to_lowercase();
        assert!(head.starts_with("post /api/transaction/begin"));
        assert!(head.contains("db: db"));
        assert!(head.contains("table: tbl"));

        client.load(&request(LoadMode::Transaction)).await.unwrap();
        let head = seen.recv().await.unwrap().to_lowercase();
        assert!(head.starts_with("put /api/transaction/load"));
        assert!(head.contains("label: job-1"));
    }

    #[tokio::test]
    async fn test_label_collision_is_reported() {
        let (endpoint, _seen) = serve(vec![r#"{"Status":"Label Already Exists"}"#]).await;
        let client = client(&endpoint, &[]);
        assert_eq!(
            client.begin(&Label::new("job-1")).await.unwrap_err(),
            StreamLoadError::LabelAlreadyExists("job-1".into())
        );
    }

    #[tokio::test]
    async fn test_connection_failure_moves_to_next_endpoint() {
        let dead = unused_endpoint().await;
        let (live, mut seen) = serve(vec![r#"{"Status":"OK"}"#, r#"{"Status":"OK"}"#]).await;
        let client = client(&format!("{dead},{live}"), &[]);

        client.load(&request(LoadMode::AutoCommit)).await.unwrap();
        assert!(seen.recv().await.is_some());

        // The failed endpoint is no longer tried first.
        let first = client.endpoints.rotation().next().map(|(idx, _)| idx);
        assert_eq!(first, Some(1));
        client.load(&request(LoadMode::AutoCommit)).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_timeout_moves_to_next_endpoint() {
        // Non-routable: the handshake is dropped or refused, never answered.
        let blackhole = "10.255.255.1:8030";
        let (live, mut seen) = serve(vec![r#"{"Status":"OK"}"#]).await;
        let client = client(
            &format!("{blackhole},{live}"),
            &[("write.ctl.connectTimeout", "200")],
        );

        let err = client
            .http
            .get(format!("http://{blackhole}/"))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(
            client.transport_error(blackhole, err),
            StreamLoadError::Io { .. }
        ));

        client.load(&request(LoadMode::AutoCommit)).await.unwrap();
        assert!(seen.recv().await.is_some());
        let first = client.endpoints.rotation().next().map(|(idx, _)| idx);
        assert_eq!(first, Some(1));
    }

    #[tokio::test]
    async fn test_all_endpoints_down() {
        let dead = unused_endpoint().await;
        let client = client(&dead, &[]);
        let err = client.load(&request(LoadMode::AutoCommit)).await.unwrap_err();
        assert!(matches!(err, StreamLoadError::Io { .. }));
    }
}
