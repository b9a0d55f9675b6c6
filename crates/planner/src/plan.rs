use crate::distribution::{DistributionRequirement, SortOrder};
use serde::{Deserialize, Serialize};

/// What the host engine must know before scheduling writer tasks for one
/// target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritePlan {
    pub database: String,
    pub table: String,
    pub distribution: DistributionRequirement,
    pub ordering: Vec<SortOrder>,
}

impl WritePlan {
    pub fn description(&self) -> String {
        format!("BulkLoadWrite[{}.{}]", self.database, self.table)
    }

    /// Number of writer tasks the engine must run; `0` leaves it to the engine.
    pub fn required_num_partitions(&self) -> usize {
        self.distribution.partitions().unwrap_or(0)
    }

    pub fn hash(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", md5::compute(serialized))
    }
}
