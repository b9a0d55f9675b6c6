use crate::{
    error::ConfigError,
    job::{JobConfig, Scope},
    options::{
        DEFAULT_REQUEST_RETRIES, DEFAULT_REQUEST_TIMEOUT_MS, KEY_COLUMNS, KEY_DATABASE,
        KEY_FE_HTTP, KEY_FE_JDBC, KEY_PASSWORD, KEY_REQUEST_CONNECT_TIMEOUT,
        KEY_REQUEST_RETRIES, KEY_REQUEST_SOCKET_TIMEOUT, KEY_TABLE, KEY_USERNAME,
    },
};

/// Connection settings shared by the read and write sides, resolved for one
/// [`Scope`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub fe_http_urls: Vec<String>,
    pub fe_jdbc_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub table: Option<String>,
    pub columns: Option<Vec<String>>,
    pub request_retries: u32,
    pub request_connect_timeout_ms: u64,
    pub request_socket_timeout_ms: u64,
}

impl ConnectionSettings {
    pub fn load(options: &JobConfig, scope: Scope) -> Result<Self, ConfigError> {
        let key = |k: &str| scope.candidates(k);

        Ok(Self {
            fe_http_urls: options.get_array(&key(KEY_FE_HTTP)).unwrap_or_default(),
            fe_jdbc_url: options.get_string(&key(KEY_FE_JDBC)),
            username: options.get_string(&key(KEY_USERNAME)),
            password: options.get_string(&key(KEY_PASSWORD)),
            database: options.get_string(&key(KEY_DATABASE)),
            table: options.get_string(&key(KEY_TABLE)),
            columns: options
                .get_array(&key(KEY_COLUMNS))
                .filter(|cols| !cols.is_empty()),
            request_retries: options.get_u32(&key(KEY_REQUEST_RETRIES), DEFAULT_REQUEST_RETRIES)?,
            request_connect_timeout_ms: options
                .get_opt_u64(&key(KEY_REQUEST_CONNECT_TIMEOUT))?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
            request_socket_timeout_ms: options
                .get_opt_u64(&key(KEY_REQUEST_SOCKET_TIMEOUT))?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        })
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("fe_http_urls", &self.fe_http_urls)
            .field("fe_jdbc_url", &self.fe_jdbc_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "******"))
            .field("database", &self.database)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("request_retries", &self.request_retries)
            .field("request_connect_timeout_ms", &self.request_connect_timeout_ms)
            .field("request_socket_timeout_ms", &self.request_socket_timeout_ms)
            .finish()
    }
}
