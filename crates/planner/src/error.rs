use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Partition column '{0}' is not part of the output schema")]
    UnknownColumn(String),

    #[error("Cannot cluster rows: no partition columns configured and the schema is empty")]
    NoClusteringColumns,
}
