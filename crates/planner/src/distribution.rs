use crate::error::PlanError;
use model::records::schema::Schema;
use serde::{Deserialize, Serialize};

/// How rows must be grouped before they reach the writer tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DistributionRequirement {
    /// The engine may hand rows to tasks however it likes.
    Unspecified,
    /// Rows sharing the same values for `columns` must land in the same one of
    /// exactly `partitions` groups.
    Clustered {
        columns: Vec<String>,
        partitions: usize,
    },
}

impl DistributionRequirement {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, DistributionRequirement::Unspecified)
    }

    pub fn partitions(&self) -> Option<usize> {
        match self {
            DistributionRequirement::Unspecified => None,
            DistributionRequirement::Clustered { partitions, .. } => Some(*partitions),
        }
    }

    pub fn clustering_columns(&self) -> &[String] {
        match self {
            DistributionRequirement::Unspecified => &[],
            DistributionRequirement::Clustered { columns, .. } => columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub descending: bool,
}

/// Computes the distribution the compute engine must satisfy before rows are
/// routed to writer tasks.
pub struct DistributionPlanner;

impl DistributionPlanner {
    /// `requested_tasks <= 0` leaves the distribution to the engine. Otherwise
    /// rows are clustered by `partition_columns`, or by every schema column
    /// when none are configured, into exactly `requested_tasks` groups.
    pub fn plan(
        requested_tasks: i32,
        partition_columns: Option<&[String]>,
        schema: &Schema,
    ) -> Result<DistributionRequirement, PlanError> {
        if requested_tasks <= 0 {
            return Ok(DistributionRequirement::Unspecified);
        }

        let columns = match partition_columns {
            Some(columns) if !columns.is_empty() => {
                if let Some(unknown) = columns.iter().find(|c| !schema.contains(c)) {
                    return Err(PlanError::UnknownColumn(unknown.clone()));
                }
                columns.to_vec()
            }
            _ => schema.names().to_vec(),
        };

        if columns.is_empty() {
            return Err(PlanError::NoClusteringColumns);
        }

        Ok(DistributionRequirement::Clustered {
            columns,
            partitions: requested_tasks as usize,
        })
    }

    /// Bulk load accepts rows in any order within a group.
    pub fn required_ordering() -> Vec<SortOrder> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(["id", "dt", "region"])
    }

    #[test]
    fn test_non_positive_request_is_unspecified() {
        for requested in [0, -1, i32::MIN] {
            let req = DistributionPlanner::plan(requested, None, &schema()).unwrap();
            assert!(req.is_unspecified());
            assert_eq!(req.partitions(), None);
        }
    }

    #[test]
    fn test_clusters_by_configured_columns() {
        let cols = vec!["dt".to_string()];
        let req = DistributionPlanner::plan(4, Some(&cols), &schema()).unwrap();
        assert_eq!(
            req,
            DistributionRequirement::Clustered {
                columns: vec!["dt".into()],
                partitions: 4,
            }
        );
        assert!(DistributionPlanner::required_ordering().is_empty());
    }

    #[test]
    fn test_falls_back_to_every_schema_column() {
        for n in 1..=8 {
            let req = DistributionPlanner::plan(n, None, &schema()).unwrap();
            assert_eq!(req.partitions(), Some(n as usize));
            assert_eq!(req.clustering_columns(), schema().names());
        }
    }

    #[test]
    fn test_unknown_partition_column() {
        let cols = vec!["nope".to_string()];
        assert_eq!(
            DistributionPlanner::plan(2, Some(&cols), &schema()),
            Err(PlanError::UnknownColumn("nope".into()))
        );
    }

    #[test]
    fn test_empty_schema_without_columns() {
        assert_eq!(
            DistributionPlanner::plan(2, None, &Schema::default()),
            Err(PlanError::NoClusteringColumns)
        );
    }
}
