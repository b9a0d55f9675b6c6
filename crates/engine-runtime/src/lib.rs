pub mod error;
pub mod execution;

pub use execution::executor::{LoadJob, run};
