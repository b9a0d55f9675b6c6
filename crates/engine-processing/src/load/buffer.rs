use crate::{
    error::{ChunkFlushError, TaskFailureCause},
    load::{
        chunk::Chunk,
        encoder::RowEncoder,
        stream::{FlushOutcome, StreamHandle},
    },
};
use model::records::row::RowData;
use std::time::{Duration, Instant};
use tracing::debug;

/// When a buffered chunk is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushLimits {
    /// Hard upper bound of a request body.
    pub chunk_limit: usize,
    /// Send as soon as this many bytes are buffered.
    pub cache_max_bytes: Option<usize>,
    /// Send once this much time has passed since the previous send.
    pub expect_delay: Option<Duration>,
}

/// Accumulates encoded rows of one writer task and flushes them through the
/// task's [`StreamHandle`].
///
/// Every flush is awaited before the next row is buffered, so a task holds at
/// most one chunk in memory besides the one in flight.
pub struct ChunkBuffer {
    handle: StreamHandle,
    encoder: RowEncoder,
    limits: FlushLimits,
    current: Chunk,
    next_sequence: u64,
    last_flush: Instant,
}

impl ChunkBuffer {
    pub fn new(handle: StreamHandle, encoder: RowEncoder, limits: FlushLimits) -> Self {
        let current = Chunk::new(0, &encoder);
        Self {
            handle,
            encoder,
            limits,
            current,
            next_sequence: 1,
            last_flush: Instant::now(),
        }
    }

    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut StreamHandle {
        &mut self.handle
    }

    /// Rows accepted but not yet sent.
    pub fn buffered_rows(&self) -> usize {
        self.current.rows()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.current.len()
    }

    pub async fn append(&mut self, row: &RowData) -> Result<(), TaskFailureCause> {
        let encoded = self
            .encoder
            .encode(row)
            .map_err(|e| TaskFailureCause::Encode(e.to_string()))?;

        if self.encoder.framed_len(encoded.len()) > self.limits.chunk_limit {
            // Sent alone rather than split or dropped.
            self.flush().await?;
            debug!(
                task_id = %self.handle.task_id(),
                bytes = encoded.len(),
                limit = self.limits.chunk_limit,
                "Row exceeds chunk limit, sending it as its own chunk"
            );
            self.current.push(&encoded, &self.encoder);
            self.flush().await?;
            return Ok(());
        }

        if self.current.len_with(encoded.len(), &self.encoder) > self.limits.chunk_limit {
            self.flush().await?;
        }
        self.current.push(&encoded, &self.encoder);

        if self.should_flush_early() {
            self.flush().await?;
        }
        Ok(())
    }

    fn should_flush_early(&self) -> bool {
        if let Some(cache) = self.limits.cache_max_bytes
            && self.current.len() >= cache
        {
            return true;
        }
        matches!(self.limits.expect_delay, Some(delay) if self.last_flush.elapsed() >= delay)
    }

    /// Sends the buffered rows, if any, as one chunk.
    pub async fn flush(&mut self) -> Result<Option<FlushOutcome>, ChunkFlushError> {
        if self.current.is_empty() {
            return Ok(None);
        }

        let next = Chunk::new(self.next_sequence, &self.encoder);
        let chunk = std::mem::replace(&mut self.current, next).finish(&self.encoder);
        self.next_sequence += 1;
        self.last_flush = Instant::now();

        self.handle.flush(chunk).await.map(Some)
    }

    /// Flushes the remainder and closes the stream.
    pub async fn close(&mut self) -> Result<(), ChunkFlushError> {
        self.flush().await?;
        self.handle.close();
        Ok(())
    }

    /// Drops buffered rows and aborts the stream locally.
    pub fn abort(&mut self) -> usize {
        let dropped = self.current.rows();
        let next = Chunk::new(self.next_sequence, &self.encoder);
        self.current = next;
        self.handle.abort();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        load::stream::{StreamContext, StreamState},
        testing::{Call, MockClient},
    };
    use engine_config::DataFormat;
    use engine_core::{
        connectors::stream_load::LoadMode, metrics::LoadMetrics, retry::RetryPolicy,
    };
    use model::core::{
        identifiers::{Label, TaskId},
        value::{FieldValue, Value},
    };
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn buffer(client: Arc<MockClient>, format: DataFormat, limits: FlushLimits) -> ChunkBuffer {
        let ctx = StreamContext {
            client,
            label: Label::new("job"),
            mode: LoadMode::Transaction,
            retry: RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_secs(5),
            metrics: LoadMetrics::new(),
        };
        let handle = StreamHandle::new(TaskId(0), ctx, CancellationToken::new());
        ChunkBuffer::new(handle, RowEncoder::new(&format, None), limits)
    }

    fn limits(chunk_limit: usize) -> FlushLimits {
        FlushLimits {
            chunk_limit,
            cache_max_bytes: None,
            expect_delay: None,
        }
    }

    fn row(value: &str) -> RowData {
        RowData::new(vec![FieldValue::new("v", Value::String(value.into()))])
    }

    fn csv() -> DataFormat {
        DataFormat::Csv {
            row_delimiter: "\n".into(),
            column_separator: ",".into(),
        }
    }

    fn bodies(client: &MockClient) -> Vec<Vec<u8>> {
        client
            .loads()
            .into_iter()
            .filter_map(|c| match c {
                Call::Load { body, .. } => Some(body),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_chunks_never_exceed_limit() {
        let client = Arc::new(MockClient::default());
        let mut buffer = buffer(client.clone(), csv(), limits(10));

        for value in ["aaa", "bbb", "ccc", "dd", "e"] {
            buffer.append(&row(value)).await.unwrap();
        }
        buffer.close().await.unwrap();

        let bodies = bodies(&client);
        assert_eq!(
            bodies,
            vec![b"aaa\nbbb".to_vec(), b"ccc\ndd\ne".to_vec()]
        );
        assert!(bodies.iter().all(|b| b.len() <= 10));
        assert_eq!(buffer.handle().rows_written(), 5);
        assert_eq!(buffer.handle().state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn test_oversized_row_is_sent_alone() {
        let client = Arc::new(MockClient::default());
        let mut buffer = buffer(client.clone(), csv(), limits(8));

        buffer.append(&row("ab")).await.unwrap();
        buffer.append(&row("0123456789")).await.unwrap();
        buffer.append(&row("cd")).await.unwrap();
        buffer.close().await.unwrap();

        assert_eq!(
            bodies(&client),
            vec![b"ab".to_vec(), b"0123456789".to_vec(), b"cd".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_json_chunks_are_arrays() {
        let client = Arc::new(MockClient::default());
        let mut buffer = buffer(client.clone(), DataFormat::Json, limits(1024));
        buffer.append(&row("a")).await.unwrap();
        buffer.append(&row("b")).await.unwrap();
        buffer.close().await.unwrap();

        assert_eq!(bodies(&client), vec![br#"[{"v":"a"},{"v":"b"}]"#.to_vec()]);
    }

    #[tokio::test]
    async fn test_cache_budget_flushes_early() {
        let client = Arc::new(MockClient::default());
        let mut buffer = buffer(
            client.clone(),
            csv(),
            FlushLimits {
                chunk_limit: 1024,
                cache_max_bytes: Some(5),
                expect_delay: None,
            },
        );
        for value in ["abc", "def", "g"] {
            buffer.append(&row(value)).await.unwrap();
        }
        assert_eq!(buffer.buffered_rows(), 1);
        assert_eq!(bodies(&client), vec![b"abc\ndef".to_vec()]);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let client = Arc::new(MockClient::default());
        client
            .transient_load_failures
            .store(2, std::sync::atomic::Ordering::SeqCst);
        let mut buffer = buffer(client.clone(), csv(), limits(64));
        buffer.append(&row("a")).await.unwrap();

        let outcome = buffer.flush().await.unwrap().unwrap();
        assert_eq!(outcome.attempts, 3);
        assert_eq!(client.loads().len(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_chunk_flush_error() {
        let client = Arc::new(MockClient::default());
        client
            .transient_load_failures
            .store(10, std::sync::atomic::Ordering::SeqCst);
        let mut buffer = buffer(client.clone(), csv(), limits(64));
        buffer.append(&row("a")).await.unwrap();
        buffer.append(&row("b")).await.unwrap();

        let err = buffer.flush().await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.rows, 2);
        assert_eq!(err.sequence, 0);
        assert!(matches!(err.source, engine_core::error::StreamLoadError::Io { .. }));
    }
}
