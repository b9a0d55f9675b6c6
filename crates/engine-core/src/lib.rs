pub mod connectors;
pub mod error;
pub mod label;
pub mod metrics;
pub mod retry;
pub mod telemetry;
