use crate::{
    error::ConfigError,
    options::{
        KEY_CTL_CHUNK_LIMIT, KEY_CTL_IO_THREAD_COUNT, KEY_DATABASE, KEY_FE_HTTP,
        KEY_PROPS_FORMAT, KEY_TABLE, PROP_COLUMNS, PROP_FORMAT, PROP_STRIP_OUTER_ARRAY,
    },
    write::WriteConfig,
};
use model::execution::properties::Properties;
use serde::Serialize;
use std::{fmt, time::Duration};

/// Payload format of a load request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataFormat {
    /// Rows are JSON objects; a chunk is sent as one JSON array.
    Json,
    Csv {
        row_delimiter: String,
        column_separator: String,
    },
}

impl DataFormat {
    pub fn name(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Csv { .. } => "csv",
        }
    }
}

/// Table-scoped part of the load properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoadProperties {
    pub database: String,
    pub table: String,
    /// Comma-joined column list, when configured.
    pub columns: Option<String>,
    pub format: DataFormat,
    pub chunk_limit: u64,
    /// Properties forwarded to the protocol as request headers.
    pub properties: Properties,
}

/// Job-scoped part of the load properties.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct JobLoadProperties {
    pub load_urls: Vec<String>,
    pub jdbc_url: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub io_thread_count: usize,
    pub enable_transaction: bool,
    pub label_prefix: Option<String>,
    pub cache_max_bytes: Option<u64>,
    pub expect_delay_time_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub request_retries: u32,
    pub request_connect_timeout_ms: u64,
    pub request_socket_timeout_ms: u64,
}

impl fmt::Debug for JobLoadProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobLoadProperties")
            .field("load_urls", &self.load_urls)
            .field("jdbc_url", &self.jdbc_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "******"))
            .field("io_thread_count", &self.io_thread_count)
            .field("enable_transaction", &self.enable_transaction)
            .field("label_prefix", &self.label_prefix)
            .field("cache_max_bytes", &self.cache_max_bytes)
            .field("expect_delay_time_ms", &self.expect_delay_time_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_retries", &self.request_retries)
            .field("request_connect_timeout_ms", &self.request_connect_timeout_ms)
            .field("request_socket_timeout_ms", &self.request_socket_timeout_ms)
            .finish()
    }
}

/// Protocol-facing view of a write config. One instance per job, shared by
/// reference with every writer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadProperties {
    table: TableLoadProperties,
    job: JobLoadProperties,
}

impl LoadProperties {
    pub fn table(&self) -> &TableLoadProperties {
        &self.table
    }

    pub fn job(&self) -> &JobLoadProperties {
        &self.job
    }

    pub fn is_transactional(&self) -> bool {
        self.job.enable_transaction
    }

    pub fn format(&self) -> &DataFormat {
        &self.table.format
    }

    pub fn chunk_limit(&self) -> u64 {
        self.table.chunk_limit
    }

    /// Connect timeout for load requests; the control override wins when set.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.job
                .connect_timeout_ms
                .unwrap_or(self.job.request_connect_timeout_ms),
        )
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.job.request_socket_timeout_ms)
    }

    /// Upper bound for one request attempt, connect plus transfer.
    pub fn attempt_timeout(&self) -> Duration {
        self.connect_timeout() + self.socket_timeout()
    }
}

impl TryFrom<&WriteConfig> for LoadProperties {
    type Error = ConfigError;

    fn try_from(config: &WriteConfig) -> Result<Self, Self::Error> {
        let database = config
            .database()
            .ok_or_else(|| ConfigError::MissingKey(KEY_DATABASE.to_string()))?
            .to_string();
        let table = config
            .table()
            .ok_or_else(|| ConfigError::MissingKey(KEY_TABLE.to_string()))?
            .to_string();
        if config.fe_http_urls().is_empty() {
            return Err(ConfigError::MissingKey(KEY_FE_HTTP.to_string()));
        }

        let chunk_limit = u64::try_from(config.chunk_limit())
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                ConfigError::invalid(
                    KEY_CTL_CHUNK_LIMIT,
                    &config.chunk_limit().to_string(),
                    "a positive byte count",
                )
            })?;
        let io_thread_count = usize::try_from(config.io_thread_count())
            .ok()
            .filter(|threads| *threads > 0)
            .ok_or_else(|| {
                ConfigError::invalid(
                    KEY_CTL_IO_THREAD_COUNT,
                    &config.io_thread_count().to_string(),
                    "a positive thread count",
                )
            })?;

        let format = resolve_format(config)?;
        let columns = config.columns().map(|cols| cols.join(","));

        let mut properties = config.properties().clone();
        if let Some(columns) = &columns
            && !properties.contains_key(PROP_COLUMNS)
        {
            properties.insert(PROP_COLUMNS, columns.clone());
        }
        // The protocol needs the format header whatever the user supplied.
        properties.insert(PROP_FORMAT, format.name());
        if format == DataFormat::Json {
            // Chunks are sent as one JSON array.
            properties.insert(PROP_STRIP_OUTER_ARRAY, "true");
        }

        Ok(LoadProperties {
            table: TableLoadProperties {
                database,
                table,
                columns,
                format,
                chunk_limit,
                properties,
            },
            job: JobLoadProperties {
                load_urls: config.fe_http_urls().to_vec(),
                jdbc_url: config.fe_jdbc_url().map(str::to_string),
                username: config.username().map(str::to_string),
                password: config.password().map(str::to_string),
                io_thread_count,
                enable_transaction: config.enable_transaction(),
                label_prefix: config.label_prefix().map(str::to_string),
                cache_max_bytes: config.cache_max_bytes(),
                expect_delay_time_ms: config.expect_delay_time_ms(),
                connect_timeout_ms: config.connect_timeout_ms(),
                request_retries: config.request_retries(),
                request_connect_timeout_ms: config.request_connect_timeout_ms(),
                request_socket_timeout_ms: config.request_socket_timeout_ms(),
            },
        })
    }
}

fn resolve_format(config: &WriteConfig) -> Result<DataFormat, ConfigError> {
    let format = config.format();
    if format.eq_ignore_ascii_case("json") {
        Ok(DataFormat::Json)
    } else if format.eq_ignore_ascii_case("csv") {
        Ok(DataFormat::Csv {
            row_delimiter: config.row_delimiter().to_string(),
            column_separator: config.column_separator().to_string(),
        })
    } else {
        Err(ConfigError::invalid(KEY_PROPS_FORMAT, format, "'json' or 'csv'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    fn build(extra: &[(&str, &str)]) -> Result<LoadProperties, ConfigError> {
        let mut options = extra.to_vec();
        options.extend([
            ("fe.http.url", "fe1:8030,fe2:8030"),
            ("database", "db"),
            ("table", "tbl"),
        ]);
        let config = resolve(options).as_write_config()?;
        LoadProperties::try_from(&config)
    }

    #[test]
    fn test_csv_with_custom_row_delimiter() {
        let props = build(&[
            ("write.properties.format", "csv"),
            ("write.properties.row_delimiter", ";"),
        ])
        .unwrap();
        assert_eq!(
            props.format(),
            &DataFormat::Csv {
                row_delimiter: ";".into(),
                column_separator: "\t".into(),
            }
        );
        assert_eq!(props.table().properties.get("format"), Some("csv"));
        assert_eq!(props.table().properties.get("row_delimiter"), Some(";"));
        assert!(!props.table().properties.contains_key("strip_outer_array"));
    }

    #[test]
    fn test_json_is_default_and_strips_outer_array() {
        let props = build(&[]).unwrap();
        assert_eq!(props.format(), &DataFormat::Json);
        assert_eq!(props.table().properties.get("format"), Some("json"));
        assert_eq!(
            props.table().properties.get("strip_outer_array"),
            Some("true")
        );
    }

    #[test]
    fn test_format_is_normalized_into_properties() {
        let props = build(&[("write.properties.format", "JSON")]).unwrap();
        assert_eq!(props.table().properties.get("format"), Some("json"));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = build(&[("write.properties.format", "parquet")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_PROPS_FORMAT));
    }

    #[test]
    fn test_columns_injected_unless_declared() {
        let props = build(&[("columns", "id, name")]).unwrap();
        assert_eq!(props.table().columns.as_deref(), Some("id,name"));
        assert_eq!(props.table().properties.get("columns"), Some("id,name"));

        let props = build(&[
            ("columns", "id,name"),
            ("write.properties.columns", "id,name,tmp=name"),
        ])
        .unwrap();
        assert_eq!(
            props.table().properties.get("columns"),
            Some("id,name,tmp=name")
        );
    }

    #[test]
    fn test_optional_tunables_pass_through_only_when_present() {
        let props = build(&[]).unwrap();
        assert_eq!(props.job().cache_max_bytes, None);
        assert_eq!(props.job().expect_delay_time_ms, None);
        assert_eq!(props.job().connect_timeout_ms, None);
        assert_eq!(props.job().label_prefix, None);
        assert_eq!(props.connect_timeout(), Duration::from_millis(30_000));

        let props = build(&[
            ("write.ctl.connectTimeout", "1000"),
            ("write.ctl.labelPrefix", "etl_"),
        ])
        .unwrap();
        assert_eq!(props.job().connect_timeout_ms, Some(1000));
        assert_eq!(props.job().label_prefix.as_deref(), Some("etl_"));
        assert_eq!(props.connect_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_required_keys() {
        let config = resolve([("database", "db")]).as_write_config().unwrap();
        assert_eq!(
            LoadProperties::try_from(&config).unwrap_err(),
            ConfigError::MissingKey("table".into())
        );

        let config = resolve([("database", "db"), ("table", "t")])
            .as_write_config()
            .unwrap();
        assert_eq!(
            LoadProperties::try_from(&config).unwrap_err(),
            ConfigError::MissingKey("fe.http.url".into())
        );
    }

    #[test]
    fn test_non_positive_chunk_limit_is_rejected() {
        let err = build(&[("write.ctl.chunk_limit", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_CTL_CHUNK_LIMIT));
    }

    #[test]
    fn test_debug_masks_password() {
        let props = build(&[("password", "hunter2")]).unwrap();
        let rendered = format!("{props:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
