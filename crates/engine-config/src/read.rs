use crate::{
    connection::ConnectionSettings,
    error::ConfigError,
    job::{JobConfig, Scope},
    write::WriteConfig,
};

/// Read-side view of a [`JobConfig`]. Only the connection settings are
/// resolved here; query planning for reads lives outside this workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadConfig {
    options: JobConfig,
    connection: ConnectionSettings,
}

impl ReadConfig {
    pub(crate) fn load(options: JobConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            connection: ConnectionSettings::load(&options, Scope::Read)?,
            options,
        })
    }

    pub fn options(&self) -> &JobConfig {
        &self.options
    }

    pub fn as_read_config(&self) -> ReadConfig {
        self.clone()
    }

    pub fn as_write_config(&self) -> Result<WriteConfig, ConfigError> {
        WriteConfig::load(self.options.clone())
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

    pub fn fe_http_urls(&self) -> &[String] {
        &self.connection.fe_http_urls
    }
}
