use crate::error::RuntimeError;
use connectors::HttpStreamLoadClient;
use engine_config::LoadProperties;
use engine_core::connectors::stream_load::StreamLoadClient;
use std::sync::Arc;

/// Builds the HTTP client a job's writers share.
pub fn create_client(
    props: &Arc<LoadProperties>,
) -> Result<Arc<dyn StreamLoadClient>, RuntimeError> {
    let client = HttpStreamLoadClient::new(Arc::clone(props))?;
    Ok(Arc::new(client))
}
