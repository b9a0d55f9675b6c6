use engine_config::DataFormat;
use model::records::row::RowData;

/// Marker the store reads as NULL in delimited payloads.
pub const CSV_NULL: &str = "\\N";

/// Serializes rows into the chunk body format the store was told to expect.
#[derive(Debug, Clone)]
pub enum RowEncoder {
    /// Each row is one JSON object; a chunk is `[row,row,...]`.
    Json,
    Csv {
        /// Output column order; `None` keeps each row's own field order.
        columns: Option<Vec<String>>,
        row_delimiter: Vec<u8>,
        column_separator: String,
    },
}

impl RowEncoder {
    pub fn new(format: &DataFormat, columns: Option<&str>) -> Self {
        match format {
            DataFormat::Json => RowEncoder::Json,
            DataFormat::Csv {
                row_delimiter,
                column_separator,
            } => RowEncoder::Csv {
                columns: columns.map(|cols| {
                    cols.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string)
                        .collect()
                }),
                row_delimiter: row_delimiter.as_bytes().to_vec(),
                column_separator: column_separator.clone(),
            },
        }
    }

    pub fn encode(&self, row: &RowData) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            RowEncoder::Json => {
                let object = row
                    .field_values
                    .iter()
                    .map(|field| {
                        let value = field
                            .value
                            .as_ref()
                            .map_or(serde_json::Value::Null, |v| v.to_json());
                        (field.name.clone(), value)
                    })
                    .collect::<serde_json::Map<_, _>>();
                serde_json::to_vec(&object)
            }
            RowEncoder::Csv {
                columns,
                column_separator,
                ..
            } => {
                let fields: Vec<String> = match columns {
                    Some(columns) => columns
                        .iter()
                        .map(|c| row.get_value(c).to_text().unwrap_or_else(|| CSV_NULL.to_string()))
                        .collect(),
                    None => row
                        .field_values
                        .iter()
                        .map(|f| {
                            f.value
                                .as_ref()
                                .and_then(|v| v.to_text())
                                .unwrap_or_else(|| CSV_NULL.to_string())
                        })
                        .collect(),
                };
                Ok(fields.join(column_separator.as_str()).into_bytes())
            }
        }
    }

    /// Bytes written before the first row of a chunk.
    pub fn open(&self) -> &[u8] {
        match self {
            RowEncoder::Json => b"[",
            RowEncoder::Csv { .. } => b"",
        }
    }

    /// Bytes written between two rows.
    pub fn separator(&self) -> &[u8] {
        match self {
            RowEncoder::Json => b",",
            RowEncoder::Csv { row_delimiter, .. } => row_delimiter,
        }
    }

    /// Bytes written after the last row of a chunk.
    pub fn close(&self) -> &[u8] {
        match self {
            RowEncoder::Json => b"]",
            RowEncoder::Csv { .. } => b"",
        }
    }

    /// Size of a chunk holding only `row_len` bytes of one row.
    pub fn framed_len(&self, row_len: usize) -> usize {
        self.open().len() + row_len + self.close().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::{FieldValue, Value};

    fn row() -> RowData {
        RowData::new(vec![
            FieldValue::new("id", Value::Int(1)),
            FieldValue::new("name", Value::String("a".into())),
            FieldValue::new("note", Value::Null),
        ])
    }

    #[test]
    fn test_json_row() {
        let encoded = RowEncoder::Json.encode(&row()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(parsed, serde_json::json!({"id": 1, "name": "a", "note": null}));
        assert_eq!(RowEncoder::Json.framed_len(encoded.len()), encoded.len() + 2);
    }

    #[test]
    fn test_csv_row_follows_configured_columns() {
        let encoder = RowEncoder::new(
            &DataFormat::Csv {
                row_delimiter: "\n".into(),
                column_separator: "|".into(),
            },
            Some("note, name,id"),
        );
        assert_eq!(encoder.encode(&row()).unwrap(), b"\\N|a|1".to_vec());
        assert_eq!(encoder.separator(), b"\n");
        assert!(encoder.open().is_empty());
    }

    #[test]
    fn test_csv_row_without_columns_keeps_row_order() {
        let encoder = RowEncoder::new(
            &DataFormat::Csv {
                row_delimiter: ";".into(),
                column_separator: "\t".into(),
            },
            None,
        );
        assert_eq!(encoder.encode(&row()).unwrap(), b"1\ta\t\\N".to_vec());
    }
}
