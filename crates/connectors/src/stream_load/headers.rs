use crate::error::ClientError;
use engine_config::LoadProperties;
use reqwest::header::{EXPECT, HeaderMap, HeaderName, HeaderValue};

pub const HEADER_LABEL: &str = "label";
pub const HEADER_DB: &str = "db";
pub const HEADER_TABLE: &str = "table";

/// Encodes control characters as `\xNN` so delimiters such as `\n` survive
/// as header values.
pub fn escape_header_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_control() {
            escaped.push_str(&format!("\\x{:02X}", c as u32));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Headers shared by every data request of a job: each protocol property
/// plus `Expect: 100-continue`.
pub fn load_headers(props: &LoadProperties) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(EXPECT, HeaderValue::from_static("100-continue"));
    for (key, value) in props.table().properties.iter() {
        insert(&mut headers, key, value)?;
    }
    Ok(headers)
}

/// Headers addressing a transaction: `label`, `db` and `table`.
pub fn transaction_headers(
    props: &LoadProperties,
    label: &str,
) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    insert(&mut headers, HEADER_LABEL, label)?;
    insert(&mut headers, HEADER_DB, &props.table().database)?;
    insert(&mut headers, HEADER_TABLE, &props.table().table)?;
    Ok(headers)
}

pub fn insert(headers: &mut HeaderMap, key: &str, value: &str) -> Result<(), ClientError> {
    let invalid = |reason: String| ClientError::InvalidHeader {
        key: key.to_string(),
        reason,
    };
    let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let value =
        HeaderValue::from_str(&escape_header_value(value)).map_err(|e| invalid(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}
