//! The `WorkerInstance` capability and the fixed-size instance pool.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Coarse outcome of a delivery that reached the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStatus(pub u16);

impl DeliveryStatus {
    pub const OK: Self = Self(200);

    /// `true` for any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A backend worker that accepts one encoded slice payload per call.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the pool stores them as
/// `Arc<dyn WorkerInstance>`.
#[async_trait]
pub trait WorkerInstance: Send + Sync + 'static {
    /// Deliver an encoded `NormalizedPayload` and wait for the response.
    ///
    /// `Err` means the call itself failed; a reachable instance that rejects
    /// the payload returns `Ok` with a non-2xx status.
    async fn deliver(&self, payload: Bytes) -> Result<DeliveryStatus, TransportError>;

    /// Stable logical name, e.g. `container/1`.
    fn name(&self) -> &str;
}

/// Logical name of instance `index` within `namespace`.
pub fn instance_name(namespace: &str, index: usize) -> String {
    format!("{namespace}/{index}")
}

/// A fixed pool of worker instances addressed by index.
///
/// Instances are resolved once at construction, so the same index always
/// addresses the same instance for the lifetime of the pool.
#[derive(Clone)]
pub struct InstancePool {
    instances: Vec<Arc<dyn WorkerInstance>>,
}

impl InstancePool {
    pub fn new(instances: Vec<Arc<dyn WorkerInstance>>) -> Self {
        Self { instances }
    }

    /// Build `size` instances by calling `resolve` for each index.
    pub fn build<F>(size: usize, resolve: F) -> Result<Self, TransportError>
    where
        F: FnMut(usize) -> Result<Arc<dyn WorkerInstance>, TransportError>,
    {
        let instances = (0..size).map(resolve).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { instances })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn WorkerInstance>> {
        self.instances.get(index)
    }

    /// Names of all instances in index order.
    pub fn names(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.name().to_string()).collect()
    }
}

impl std::fmt::Debug for InstancePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancePool")
            .field("instances", &self.names())
            .finish()
    }
}
