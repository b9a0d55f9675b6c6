use crate::records::row::RowData;
use serde::{Deserialize, Serialize};

/// Column layout of the rows handed to the writer, as declared by the
/// compute engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Infers a schema from the field order of a sample row.
    pub fn from_row(row: &RowData) -> Self {
        Schema::new(row.field_names())
    }

    pub fn names(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
