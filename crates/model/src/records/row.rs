use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// One row flowing from the compute engine into a writer task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(field_values: Vec<FieldValue>) -> Self {
        RowData { field_values }
    }

    /// Builds a row from a decoded JSON object. Fields follow the map's key order.
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        let field_values = object
            .into_iter()
            .map(|(name, value)| FieldValue::new(name, Value::from_json(value)))
            .collect();
        RowData { field_values }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .and_then(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.field_values.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.field_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field_values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let row = RowData::new(vec![FieldValue::new("Id", Value::Int(1))]);
        assert_eq!(row.get_value("id"), Value::Int(1));
        assert_eq!(row.get_value("missing"), Value::Null);
    }

    #[test]
    fn test_from_json_object_keeps_nulls_as_absent_values() {
        let object = json!({ "a": 1, "b": null })
            .as_object()
            .cloned()
            .unwrap();
        let row = RowData::from_json_object(object);
        assert_eq!(row.len(), 2);
        assert!(row.get("b").unwrap().value.is_none());
    }
}
