use crate::error::CliError;
use std::{fs, path::Path};

/// Connector options gathered from an options file and the command line,
/// in the order they were given. Later entries win on resolution.
#[derive(Debug, Clone, Default)]
pub struct OptionSet {
    entries: Vec<(String, String)>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a KEY=VALUE file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Options(format!(
                "Failed to read options file {}: {}",
                path.display(),
                e
            ))
        })?;

        self.parse_content(&content)
    }

    /// Adds one `KEY=VALUE` argument from the command line.
    pub fn push_arg(&mut self, arg: &str) -> Result<(), CliError> {
        let (key, value) = split_pair(arg)
            .ok_or_else(|| CliError::Options(format!("expected KEY=VALUE, got '{arg}'")))?;
        self.entries.push((key.to_string(), unquote_value(value)));
        Ok(())
    }

    /// Entries with the last occurrence of each key first, as the resolver
    /// keeps the first value it sees for a key.
    pub fn into_resolvable(self) -> Vec<(String, String)> {
        self.entries.into_iter().rev().collect()
    }

    fn parse_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match split_pair(line) {
                Some((key, value)) => {
                    self.entries.push((key.to_string(), unquote_value(value)));
                }
                None => {
                    return Err(CliError::Options(format!(
                        "malformed line {} (expected KEY=VALUE)",
                        line_num + 1
                    )));
                }
            }
        }

        Ok(())
    }
}

fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn unquote_value(value: &str) -> String {
    let value = value.trim();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        return value[1..value.len() - 1].to_string();
    }

    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::resolve;

    #[test]
    fn test_parse_basic_options() {
        let mut options = OptionSet::new();
        let content = r#"
# Target
database=db
table = tbl
        "#;

        options.parse_content(content).unwrap();
        let config = resolve(options.into_resolvable());
        assert_eq!(config.get("database"), Some("db"));
        assert_eq!(config.get("table"), Some("tbl"));
    }

    #[test]
    fn test_parse_quoted_values() {
        let mut options = OptionSet::new();
        let content = r#"
write.properties.column_separator=","
write.ctl.labelPrefix='etl_'
write.properties.row_delimiter=;
        "#;

        options.parse_content(content).unwrap();
        let config = resolve(options.into_resolvable());
        assert_eq!(config.get("write.properties.column_separator"), Some(","));
        assert_eq!(config.get("write.ctl.labelPrefix"), Some("etl_"));
        assert_eq!(config.get("write.properties.row_delimiter"), Some(";"));
    }

    #[test]
    fn test_command_line_overrides_file() {
        let mut options = OptionSet::new();
        options.parse_content("table=from_file").unwrap();
        options.push_arg("table=from_arg").unwrap();

        let config = resolve(options.into_resolvable());
        assert_eq!(config.get("table"), Some("from_arg"));
    }

    #[test]
    fn test_invalid_lines() {
        let mut options = OptionSet::new();
        assert!(options.parse_content("NO EQUALS SIGN").is_err());
        assert!(options.parse_content("=value").is_err());
        assert!(options.push_arg("table").is_err());
    }
}
