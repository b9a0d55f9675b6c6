use crate::{
    connection::ConnectionSettings,
    error::ConfigError,
    job::{JobConfig, Scope},
    options::{
        DEFAULT_CHUNK_LIMIT, DEFAULT_COLUMN_SEPARATOR, DEFAULT_FORMAT, DEFAULT_IO_THREAD_COUNT,
        DEFAULT_ROW_DELIMITER, KEY_CTL_CACHE_MAX_BYTES, KEY_CTL_CHUNK_LIMIT,
        KEY_CTL_CONNECT_TIME_OUT, KEY_CTL_ENABLE_TRANSACTION, KEY_CTL_EXPECT_DELAY_TIME,
        KEY_CTL_IO_THREAD_COUNT, KEY_CTL_LABEL_PREFIX, KEY_NUM_PARTITIONS,
        KEY_PARTITION_COLUMNS, KEY_PROPS_COLUMN_SEPARATOR, KEY_PROPS_FORMAT,
        KEY_PROPS_ROW_DELIMITER, PROPS_PREFIX, WRITE_PREFIX,
    },
    read::ReadConfig,
    resolver::resolve,
};
use model::execution::properties::Properties;

/// Typed write-side view of a [`JobConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteConfig {
    options: JobConfig,
    connection: ConnectionSettings,

    num_partitions: i32,
    partition_columns: Option<Vec<String>>,

    enable_transaction: bool,
    cache_max_bytes: Option<u64>,
    expect_delay_time_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    label_prefix: Option<String>,
    io_thread_count: i32,
    chunk_limit: i64,

    properties: Properties,
}

impl WriteConfig {
    pub(crate) fn load(options: JobConfig) -> Result<Self, ConfigError> {
        let connection = ConnectionSettings::load(&options, Scope::Write)?;

        let properties = options
            .with_prefix(PROPS_PREFIX)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Properties>();

        Ok(Self {
            num_partitions: options.get_i32(&[KEY_NUM_PARTITIONS], 0)?,
            partition_columns: options
                .get_array(&[KEY_PARTITION_COLUMNS])
                .filter(|cols| !cols.is_empty()),
            enable_transaction: options.get_bool(&[KEY_CTL_ENABLE_TRANSACTION], false)?,
            cache_max_bytes: options.get_opt_u64(&[KEY_CTL_CACHE_MAX_BYTES])?,
            expect_delay_time_ms: options.get_opt_u64(&[KEY_CTL_EXPECT_DELAY_TIME])?,
            connect_timeout_ms: options.get_opt_u64(&[KEY_CTL_CONNECT_TIME_OUT])?,
            label_prefix: options.get_string(&[KEY_CTL_LABEL_PREFIX]),
            io_thread_count: options.get_i32(&[KEY_CTL_IO_THREAD_COUNT], DEFAULT_IO_THREAD_COUNT)?,
            chunk_limit: options.get_i64(&[KEY_CTL_CHUNK_LIMIT], DEFAULT_CHUNK_LIMIT)?,
            properties,
            connection,
            options,
        })
    }

    /// Layers `overrides` on top of this config's options. Keys are scoped to
    /// the write side unless they already are.
    pub fn with_options<I, K, V>(&self, overrides: I) -> Result<WriteConfig, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let scoped = overrides.into_iter().map(|(k, v)| {
            let key: String = k.into();
            let key = if key.starts_with(WRITE_PREFIX) {
                key
            } else {
                format!("{WRITE_PREFIX}{key}")
            };
            (key, v.into())
        });
        let base = self
            .options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>();

        resolve(scoped.chain(base)).as_write_config()
    }

    pub fn options(&self) -> &JobConfig {
        &self.options
    }

    pub fn as_write_config(&self) -> WriteConfig {
        self.clone()
    }

    pub fn as_read_config(&self) -> Result<ReadConfig, ConfigError> {
        ReadConfig::load(self.options.clone())
    }

    pub fn connection(&self) -> &ConnectionSettings {
        &self.connection
    }

    pub fn database(&self) -> Option<&str> {
        self.connection.database.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.connection.table.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.connection.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.connection.password.as_deref()
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.connection.columns.as_deref()
    }

    pub fn fe_http_urls(&self) -> &[String] {
        &self.connection.fe_http_urls
    }

    pub fn fe_jdbc_url(&self) -> Option<&str> {
        self.connection.fe_jdbc_url.as_deref()
    }

    pub fn request_retries(&self) -> u32 {
        self.connection.request_retries
    }

    pub fn request_connect_timeout_ms(&self) -> u64 {
        self.connection.request_connect_timeout_ms
    }

    pub fn request_socket_timeout_ms(&self) -> u64 {
        self.connection.request_socket_timeout_ms
    }

    pub fn num_partitions(&self) -> i32 {
        self.num_partitions
    }

    pub fn partition_columns(&self) -> Option<&[String]> {
        self.partition_columns.as_deref()
    }

    pub fn enable_transaction(&self) -> bool {
        self.enable_transaction
    }

    pub fn cache_max_bytes(&self) -> Option<u64> {
        self.cache_max_bytes
    }

    pub fn expect_delay_time_ms(&self) -> Option<u64> {
        self.expect_delay_time_ms
    }

    pub fn connect_timeout_ms(&self) -> Option<u64> {
        self.connect_timeout_ms
    }

    pub fn label_prefix(&self) -> Option<&str> {
        self.label_prefix.as_deref()
    }

    pub fn io_thread_count(&self) -> i32 {
        self.io_thread_count
    }

    pub fn chunk_limit(&self) -> i64 {
        self.chunk_limit
    }

    /// User-supplied protocol properties, exactly as configured.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn format(&self) -> &str {
        self.options.get(KEY_PROPS_FORMAT).unwrap_or(DEFAULT_FORMAT)
    }

    pub fn row_delimiter(&self) -> &str {
        self.options
            .get(KEY_PROPS_ROW_DELIMITER)
            .unwrap_or(DEFAULT_ROW_DELIMITER)
    }

    pub fn column_separator(&self) -> &str {
        self.options
            .get(KEY_PROPS_COLUMN_SEPARATOR)
            .unwrap_or(DEFAULT_COLUMN_SEPARATOR)
    }
}
