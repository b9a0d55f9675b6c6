//! Option keys understood by the load job.
//!
//! Shared keys may be scoped with [`WRITE_PREFIX`] or [`READ_PREFIX`]; the
//! scoped form wins over the shared one for that side.

pub const WRITE_PREFIX: &str = "write.";
pub const READ_PREFIX: &str = "read.";

// Shared connection keys
pub const KEY_FE_HTTP: &str = "fe.http.url";
pub const KEY_FE_JDBC: &str = "fe.jdbc.url";
pub const KEY_USERNAME: &str = "request.auth.user";
pub const KEY_PASSWORD: &str = "request.auth.password";
pub const KEY_DATABASE: &str = "database";
pub const KEY_TABLE: &str = "table";
pub const KEY_COLUMNS: &str = "columns";
pub const KEY_REQUEST_RETRIES: &str = "request.retries";
pub const KEY_REQUEST_CONNECT_TIMEOUT: &str = "request.connect.timeout.ms";
pub const KEY_REQUEST_SOCKET_TIMEOUT: &str = "request.socket.timeout.ms";

// Legacy bare keys
pub const LEGACY_USER: &str = "user";
pub const LEGACY_PASSWORD: &str = "password";
pub const LEGACY_FE_NODES: &str = "fenodes";

// Write-only keys
pub const KEY_NUM_PARTITIONS: &str = "write.num.partitions";
pub const KEY_PARTITION_COLUMNS: &str = "write.partition.columns";

pub const CTL_PREFIX: &str = "write.ctl.";
pub const KEY_CTL_ENABLE_TRANSACTION: &str = "write.ctl.enable-transaction";
pub const KEY_CTL_CACHE_MAX_BYTES: &str = "write.ctl.cacheMaxBytes";
pub const KEY_CTL_EXPECT_DELAY_TIME: &str = "write.ctl.expectDelayTime";
pub const KEY_CTL_CONNECT_TIME_OUT: &str = "write.ctl.connectTimeout";
pub const KEY_CTL_LABEL_PREFIX: &str = "write.ctl.labelPrefix";
pub const KEY_CTL_IO_THREAD_COUNT: &str = "write.ctl.ioThreadCount";
pub const KEY_CTL_CHUNK_LIMIT: &str = "write.ctl.chunk_limit";

pub const PROPS_PREFIX: &str = "write.properties.";
pub const KEY_PROPS_FORMAT: &str = "write.properties.format";
pub const KEY_PROPS_ROW_DELIMITER: &str = "write.properties.row_delimiter";
pub const KEY_PROPS_COLUMN_SEPARATOR: &str = "write.properties.column_separator";

// Protocol property names
pub const PROP_FORMAT: &str = "format";
pub const PROP_COLUMNS: &str = "columns";
pub const PROP_ROW_DELIMITER: &str = "row_delimiter";
pub const PROP_COLUMN_SEPARATOR: &str = "column_separator";
pub const PROP_STRIP_OUTER_ARRAY: &str = "strip_outer_array";

// Defaults
pub const DEFAULT_REQUEST_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CHUNK_LIMIT: i64 = 3_221_225_472;
pub const DEFAULT_IO_THREAD_COUNT: i32 = 1;
pub const DEFAULT_FORMAT: &str = "json";
pub const DEFAULT_ROW_DELIMITER: &str = "\n";
pub const DEFAULT_COLUMN_SEPARATOR: &str = "\t";

/// Key fragments whose values are masked when options are logged.
pub const SENSITIVE_PATTERNS: [&str; 5] = ["password", "passwd", "secret", "token", "credential"];
