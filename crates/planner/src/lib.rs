pub mod distribution;
pub mod error;
pub mod plan;
