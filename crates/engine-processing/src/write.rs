use crate::{coordinator::WriteCoordinator, error::JobError};
use engine_config::{LoadProperties, WriteConfig};
use engine_core::connectors::stream_load::StreamLoadClient;
use model::{core::identifiers::JobId, records::schema::Schema};
use planner::{
    distribution::{DistributionPlanner, DistributionRequirement, SortOrder},
    plan::WritePlan,
};
use std::sync::Arc;

/// What a host engine sees of a bulk-load write: the distribution it must
/// satisfy and the batch or streaming entry points.
#[derive(Debug, Clone)]
pub struct LoadWrite {
    config: WriteConfig,
    props: Arc<LoadProperties>,
    plan: WritePlan,
}

impl LoadWrite {
    pub fn new(config: WriteConfig, schema: &Schema) -> Result<Self, JobError> {
        let props = LoadProperties::try_from(&config)?;
        let distribution = DistributionPlanner::plan(
            config.num_partitions(),
            config.partition_columns(),
            schema,
        )?;
        let plan = WritePlan {
            database: props.table().database.clone(),
            table: props.table().table.clone(),
            distribution,
            ordering: DistributionPlanner::required_ordering(),
        };

        Ok(Self {
            config,
            props: Arc::new(props),
            plan,
        })
    }

    pub fn description(&self) -> String {
        self.plan.description()
    }

    pub fn config(&self) -> &WriteConfig {
        &self.config
    }

    pub fn load_properties(&self) -> &Arc<LoadProperties> {
        &self.props
    }

    pub fn plan(&self) -> &WritePlan {
        &self.plan
    }

    pub fn required_distribution(&self) -> &DistributionRequirement {
        &self.plan.distribution
    }

    pub fn required_ordering(&self) -> &[SortOrder] {
        &self.plan.ordering
    }

    pub fn required_num_partitions(&self) -> usize {
        self.plan.required_num_partitions()
    }

    pub fn to_batch(&self) -> BatchLoadWrite {
        BatchLoadWrite {
            props: Arc::clone(&self.props),
            plan: self.plan.clone(),
        }
    }

    pub fn to_streaming(&self) -> StreamingLoadWrite {
        StreamingLoadWrite {
            props: Arc::clone(&self.props),
            plan: self.plan.clone(),
        }
    }
}

/// One-shot write: a single coordinator for the whole job.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLoadWrite {
    props: Arc<LoadProperties>,
    plan: WritePlan,
}

impl BatchLoadWrite {
    pub fn plan(&self) -> &WritePlan {
        &self.plan
    }

    pub fn load_properties(&self) -> &Arc<LoadProperties> {
        &self.props
    }

    pub fn create_coordinator(
        &self,
        job_id: JobId,
        client: Arc<dyn StreamLoadClient>,
    ) -> WriteCoordinator {
        WriteCoordinator::new(job_id, Arc::clone(&self.props), client)
    }
}

/// Micro-batch write: every epoch is its own load with its own label.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingLoadWrite {
    props: Arc<LoadProperties>,
    plan: WritePlan,
}

impl StreamingLoadWrite {
    pub fn plan(&self) -> &WritePlan {
        &self.plan
    }

    pub fn load_properties(&self) -> &Arc<LoadProperties> {
        &self.props
    }

    pub fn create_coordinator(
        &self,
        query_id: JobId,
        epoch: u64,
        client: Arc<dyn StreamLoadClient>,
    ) -> WriteCoordinator {
        WriteCoordinator::new(query_id, Arc::clone(&self.props), client).with_epoch(epoch)
    }
}
