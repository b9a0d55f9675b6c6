use model::records::row::RowData;
use planner::distribution::DistributionRequirement;

/// Routes rows to writer tasks the way the write's distribution requires.
///
/// Clustered rows go to `blake3(clustering values) mod partitions`, so equal
/// keys always meet in the same task. Without a requirement rows are dealt
/// round-robin over `default_parallelism` tasks.
#[derive(Debug, Clone)]
pub struct Partitioner {
    columns: Vec<String>,
    partitions: usize,
    next: usize,
}

impl Partitioner {
    pub fn new(requirement: &DistributionRequirement, default_parallelism: usize) -> Self {
        match requirement {
            DistributionRequirement::Unspecified => Self {
                columns: Vec::new(),
                partitions: default_parallelism.max(1),
                next: 0,
            },
            DistributionRequirement::Clustered {
                columns,
                partitions,
            } => Self {
                columns: columns.clone(),
                partitions: (*partitions).max(1),
                next: 0,
            },
        }
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    pub fn partition_for(&mut self, row: &RowData) -> usize {
        if self.columns.is_empty() {
            let partition = self.next;
            self.next = (self.next + 1) % self.partitions;
            return partition;
        }

        let mut hasher = blake3::Hasher::new();
        for column in &self.columns {
            match row.get(column).and_then(|f| f.value.as_ref()) {
                Some(value) => {
                    hasher.update(b"v");
                    hasher.update(value.to_string().as_bytes());
                }
                None => {
                    hasher.update(b"n");
                }
            }
            hasher.update(b"\x1f");
        }
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.partitions as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::{FieldValue, Value};

    fn row(id: i64, region: &str) -> RowData {
        RowData::new(vec![
            FieldValue::new("id", Value::Int(id)),
            FieldValue::new("region", Value::String(region.into())),
        ])
    }

    #[test]
    fn test_clustered_rows_with_equal_keys_meet() {
        let requirement = DistributionRequirement::Clustered {
            columns: vec!["region".into()],
            partitions: 4,
        };
        let mut partitioner = Partitioner::new(&requirement, 1);
        assert_eq!(partitioner.partitions(), 4);

        for region in ["eu", "us", "apac", "latam"] {
            let first = partitioner.partition_for(&row(1, region));
            let second = partitioner.partition_for(&row(99, region));
            assert_eq!(first, second);
            assert!(first < 4);
        }
    }

    #[test]
    fn test_unspecified_is_round_robin() {
        let mut partitioner = Partitioner::new(&DistributionRequirement::Unspecified, 3);
        let routed: Vec<_> = (0..6)
            .map(|i| partitioner.partition_for(&row(i, "eu")))
            .collect();
        assert_eq!(routed, vec![0, 1, 2, 0, 1, 2]);
    }
}
