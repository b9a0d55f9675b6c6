pub mod executor;
pub mod factory;
pub mod partitioner;
