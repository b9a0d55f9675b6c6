use crate::error::CliError;
use model::records::row::RowData;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Reads one JSON object per line. Blank lines are skipped.
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<RowData>, CliError> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(parse_row(idx + 1, &line)?);
    }
    Ok(rows)
}

fn parse_row(line: usize, text: &str) -> Result<RowData, CliError> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(object)) => Ok(RowData::from_json_object(object)),
        Ok(other) => Err(CliError::Input {
            line,
            reason: format!("expected a JSON object, got {other}"),
        }),
        Err(e) => Err(CliError::Input {
            line,
            reason: e.to_string(),
        }),
    }
}
