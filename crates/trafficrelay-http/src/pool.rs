//! Instance pool construction for a deployment.

use std::sync::Arc;

use trafficrelay_core::config::DeploymentConfig;
use trafficrelay_core::error::TransportError;
use trafficrelay_core::instance::{InstancePool, WorkerInstance};

use crate::client::{build_client, HttpClientConfig, HttpWorkerInstance};

/// Build the deployment's pool: instance `i` is named
/// `{instance_namespace}/{i}` and reached at `endpoint_template` with
/// `{index}` replaced by `i`.
pub fn pool_for(deployment: &DeploymentConfig) -> Result<InstancePool, TransportError> {
    let config = HttpClientConfig {
        request_timeout: deployment.request_timeout(),
    };
    let http = build_client(&config)?;
    let pool = InstancePool::build(deployment.pool_size, |index| {
        let instance = HttpWorkerInstance::with_client(
            deployment.instance_name(index),
            &deployment.endpoint(index),
            http.clone(),
            config.request_timeout,
        )?;
        tracing::debug!(
            deployment = %deployment.name,
            instance = instance.name(),
            url = instance.url(),
            "resolved instance"
        );
        Ok(Arc::new(instance) as Arc<dyn WorkerInstance>)
    })?;
    Ok(pool)
}
