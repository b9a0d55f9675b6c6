use crate::{
    error::ConfigError,
    options::{READ_PREFIX, SENSITIVE_PATTERNS, WRITE_PREFIX},
    read::ReadConfig,
    resolver::split_list,
    write::WriteConfig,
};
use std::{collections::BTreeMap, fmt, sync::Arc};

/// Which side of the connector a lookup is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Write,
    Read,
}

impl Scope {
    pub fn prefix(self) -> &'static str {
        match self {
            Scope::Write => WRITE_PREFIX,
            Scope::Read => READ_PREFIX,
        }
    }

    pub fn other(self) -> Scope {
        match self {
            Scope::Write => Scope::Read,
            Scope::Read => Scope::Write,
        }
    }

    /// Keys consulted for a shared option, highest precedence first. The
    /// other side's scoped key is the last resort, so a value given for one
    /// side also serves the other.
    pub fn candidates(self, key: &str) -> [String; 3] {
        [
            format!("{}{}", self.prefix(), key),
            key.to_string(),
            format!("{}{}", self.other().prefix(), key),
        ]
    }
}

/// Resolved, immutable options of one load job.
///
/// Cloning is cheap; every clone and every typed view derived from it shares
/// the same underlying map.
#[derive(Clone, PartialEq, Eq)]
pub struct JobConfig {
    options: Arc<BTreeMap<String, String>>,
}

impl JobConfig {
    pub(crate) fn from_resolved(options: BTreeMap<String, String>) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Options whose key starts with `prefix`, with the prefix stripped.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.options
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v.as_str()))
    }

    /// Returns the first candidate key present, with its value.
    pub fn first<'a, K: AsRef<str>>(&'a self, candidates: &[K]) -> Option<(&'a str, &'a str)> {
        candidates.iter().find_map(|key| {
            self.options
                .get_key_value(key.as_ref())
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
    }

    pub fn get_string<K: AsRef<str>>(&self, candidates: &[K]) -> Option<String> {
        self.first(candidates).map(|(_, v)| v.to_string())
    }

    pub fn get_array<K: AsRef<str>>(&self, candidates: &[K]) -> Option<Vec<String>> {
        self.first(candidates).map(|(_, v)| split_list(v))
    }

    pub fn get_u32<K: AsRef<str>>(&self, candidates: &[K], default: u32) -> Result<u32, ConfigError> {
        Ok(self
            .parse(candidates, "a non-negative 32-bit integer")?
            .unwrap_or(default))
    }

    pub fn get_i32<K: AsRef<str>>(&self, candidates: &[K], default: i32) -> Result<i32, ConfigError> {
        Ok(self.parse(candidates, "a 32-bit integer")?.unwrap_or(default))
    }

    pub fn get_opt_u64<K: AsRef<str>>(&self, candidates: &[K]) -> Result<Option<u64>, ConfigError> {
        self.parse(candidates, "a non-negative 64-bit integer")
    }

    pub fn get_i64<K: AsRef<str>>(&self, candidates: &[K], default: i64) -> Result<i64, ConfigError> {
        Ok(self.parse(candidates, "a 64-bit integer")?.unwrap_or(default))
    }

    pub fn get_bool<K: AsRef<str>>(&self, candidates: &[K], default: bool) -> Result<bool, ConfigError> {
        match self.first(candidates) {
            None => Ok(default),
            Some((key, value)) => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigError::invalid(key, value, "'true' or 'false'")),
            },
        }
    }

    fn parse<T, K>(&self, candidates: &[K], expected: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        K: AsRef<str>,
    {
        match self.first(candidates) {
            None => Ok(None),
            Some((key, value)) => value
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::invalid(key, value, expected)),
        }
    }

    pub fn as_write_config(&self) -> Result<WriteConfig, ConfigError> {
        WriteConfig::load(self.clone())
    }

    pub fn as_read_config(&self) -> Result<ReadConfig, ConfigError> {
        ReadConfig::load(self.clone())
    }

    /// Returns `true` when both configs share the same underlying map.
    pub fn same_options(&self, other: &JobConfig) -> bool {
        Arc::ptr_eq(&self.options, &other.options)
    }

    /// Options rendered for logs, with credential values masked.
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|(k, v)| {
                let lower = k.to_ascii_lowercase();
                let masked = SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p));
                let value = if masked { "******".to_string() } else { v.clone() };
                (k.clone(), value)
            })
            .collect()
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("options", &self.redacted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    #[test]
    fn test_scoped_key_wins_over_shared() {
        let config = resolve([("write.table", "w"), ("table", "shared")]);
        assert_eq!(
            config.get_string(&Scope::Write.candidates("table")).as_deref(),
            Some("w")
        );
        assert_eq!(
            config.get_string(&Scope::Read.candidates("table")).as_deref(),
            Some("shared")
        );
    }

    #[test]
    fn test_other_scope_is_the_last_resort() {
        let config = resolve([("read.table", "r"), ("read.database", "db")]);
        assert_eq!(
            config.get_string(&Scope::Write.candidates("table")).as_deref(),
            Some("r")
        );

        let config = resolve([("read.table", "r"), ("table", "shared")]);
        assert_eq!(
            config.get_string(&Scope::Write.candidates("table")).as_deref(),
            Some("shared")
        );
    }

    #[test]
    fn test_malformed_number_names_key_and_value() {
        let config = resolve([("request.retries", "three")]);
        let err = config
            .get_u32(&Scope::Write.candidates("request.retries"), 3)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "request.retries".into(),
                value: "three".into(),
                expected: "a non-negative 32-bit integer",
            }
        );
    }

    #[test]
    fn test_defaults_apply_only_when_absent() {
        let config = resolve([("x", "1")]);
        assert_eq!(config.get_u32(&["missing"], 3).unwrap(), 3);
        assert!(!config.get_bool(&["missing"], false).unwrap());
        assert!(config.get_bool(&["x"], false).is_err());
    }

    #[test]
    fn test_prefix_iteration_strips_prefix() {
        let config = resolve([
            ("write.properties.format", "csv"),
            ("write.properties.max_filter_ratio", "0.1"),
            ("write.table", "t"),
        ]);
        let props: Vec<_> = config.with_prefix("write.properties.").collect();
        assert_eq!(props, vec![("format", "csv"), ("max_filter_ratio", "0.1")]);
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let config = resolve([("password", "hunter2"), ("user", "root")]);
        let redacted = config.redacted();
        assert_eq!(redacted["password"], "******");
        assert_eq!(redacted["request.auth.password"], "******");
        assert_eq!(redacted["user"], "root");
    }
}
