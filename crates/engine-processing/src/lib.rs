pub mod coordinator;
pub mod error;
pub mod load;
pub mod report;
pub mod retry;
pub mod write;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{TransactionState, WriteCoordinator};
pub use load::writer::TaskWriter;
pub use report::{JobSummary, TaskCommit, TaskReport};
pub use write::{BatchLoadWrite, LoadWrite, StreamingLoadWrite};
