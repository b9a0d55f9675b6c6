use crate::load::encoder::RowEncoder;
use bytes::{BufMut, Bytes, BytesMut};

/// Encoded rows waiting to be sent as one load request.
///
/// The body is kept without the closing bytes; [`Chunk::len`] counts them.
#[derive(Debug)]
pub struct Chunk {
    sequence: u64,
    body: BytesMut,
    rows: usize,
    close_len: usize,
}

impl Chunk {
    pub fn new(sequence: u64, encoder: &RowEncoder) -> Self {
        Self {
            sequence,
            body: BytesMut::new(),
            rows: 0,
            close_len: encoder.close().len(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Size of the request body if the chunk were sent now.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.body.len() + self.close_len
        }
    }

    /// Size of the request body after appending a row of `row_len` bytes.
    pub fn len_with(&self, row_len: usize, encoder: &RowEncoder) -> usize {
        if self.is_empty() {
            encoder.framed_len(row_len)
        } else {
            self.len() + encoder.separator().len() + row_len
        }
    }

    pub fn push(&mut self, row: &[u8], encoder: &RowEncoder) {
        if self.is_empty() {
            self.body.put_slice(encoder.open());
        } else {
            self.body.put_slice(encoder.separator());
        }
        self.body.put_slice(row);
        self.rows += 1;
    }

    /// Closes the body; the chunk can no longer grow.
    pub fn finish(mut self, encoder: &RowEncoder) -> SealedChunk {
        self.body.put_slice(encoder.close());
        SealedChunk {
            sequence: self.sequence,
            rows: self.rows,
            body: self.body.freeze(),
        }
    }
}

/// A chunk ready to be uploaded.
#[derive(Debug, Clone)]
pub struct SealedChunk {
    pub sequence: u64,
    pub rows: usize,
    pub body: Bytes,
}

impl SealedChunk {
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::DataFormat;

    #[test]
    fn test_json_chunk_body() {
        let encoder = RowEncoder::Json;
        let mut chunk = Chunk::new(3, &encoder);
        assert_eq!(chunk.len_with(7, &encoder), 9);

        chunk.push(br#"{"a":1}"#, &encoder);
        assert_eq!(chunk.len(), 9);
        assert_eq!(chunk.len_with(7, &encoder), 17);
        chunk.push(br#"{"a":2}"#, &encoder);
        assert_eq!(chunk.len(), 17);

        let sealed = chunk.finish(&encoder);
        assert_eq!(sealed.sequence, 3);
        assert_eq!(sealed.rows, 2);
        assert_eq!(&sealed.body[..], br#"[{"a":1},{"a":2}]"#);
        assert_eq!(sealed.len(), 17);
    }

    #[test]
    fn test_csv_chunk_body() {
        let encoder = RowEncoder::new(
            &DataFormat::Csv {
                row_delimiter: ";".into(),
                column_separator: ",".into(),
            },
            None,
        );
        let mut chunk = Chunk::new(0, &encoder);
        chunk.push(b"1,a", &encoder);
        chunk.push(b"2,b", &encoder);
        assert_eq!(chunk.len(), 7);
        assert_eq!(&chunk.finish(&encoder).body[..], b"1,a;2,b");
    }
}
