pub mod connection;
pub mod error;
pub mod job;
pub mod options;
pub mod properties;
pub mod read;
pub mod resolver;
pub mod write;

pub use error::ConfigError;
pub use job::{JobConfig, Scope};
pub use properties::{DataFormat, LoadProperties};
pub use read::ReadConfig;
pub use resolver::resolve;
pub use write::WriteConfig;
