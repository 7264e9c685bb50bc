//! Sequential slice dispatch.
//!
//! A batch is cut into slices of [`SLICE_SIZE`] messages. Each slice is
//! normalized, delivered to one randomly chosen pool instance, and then
//! either acked or requeued as a whole. A slice is fully resolved before the
//! next one is sent, so at most one delivery is in flight per batch.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{DispatchError, TransportError};
use crate::instance::InstancePool;
use crate::message::Message;
use crate::normalize::normalize_reported;
use crate::observer::{DispatchObserver, SliceReport, SliceState, TracingObserver};
use crate::selector::{InstanceSelector, RandomSelector};
use crate::sink::RetryAckSink;

/// Number of messages delivered per request.
pub const SLICE_SIZE: usize = 5;

/// Delivers batches slice by slice and commits each slice's outcome.
#[derive(Clone)]
pub struct SliceDispatcher {
    pool: InstancePool,
    selector: Arc<dyn InstanceSelector>,
    sink: RetryAckSink,
    observer: Arc<dyn DispatchObserver>,
}

impl SliceDispatcher {
    /// Create a dispatcher with uniform random selection and tracing output.
    pub fn new(pool: InstancePool, sink: RetryAckSink) -> Self {
        Self {
            pool,
            selector: Arc::new(RandomSelector),
            sink,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn InstanceSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn sink(&self) -> &RetryAckSink {
        &self.sink
    }

    pub fn observer(&self) -> &Arc<dyn DispatchObserver> {
        &self.observer
    }

    /// Process every slice of `messages` in order.
    ///
    /// Delivery failures are absorbed by requeueing; only ack/requeue
    /// failures are returned, and they stop the remaining slices.
    pub async fn dispatch(&self, messages: &[Message]) -> Result<(), DispatchError> {
        tracing::debug!(
            messages = messages.len(),
            slices = messages.len().div_ceil(SLICE_SIZE),
            "dispatching batch"
        );
        for (index, slice) in messages.chunks(SLICE_SIZE).enumerate() {
            self.dispatch_slice(index, slice).await?;
        }
        Ok(())
    }

    async fn dispatch_slice(
        &self,
        index: usize,
        slice: &[Message],
    ) -> Result<SliceReport, DispatchError> {
        let bodies: Vec<Value> = slice.iter().map(|m| m.body.clone()).collect();
        let normalization = normalize_reported(&json!({ "batchData": bodies }));
        for issue in &normalization.issues {
            self.observer.normalize_issue(index, issue);
        }

        let target = self.selector.select(self.pool.len());
        let instance = self.pool.get(target);
        let instance_name = instance
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| format!("<unresolved {target}>"));

        let result = match (instance, normalization.payload.encode()) {
            (Some(instance), Ok(payload)) => instance.deliver(payload).await,
            (None, _) => Err(TransportError::Other(format!(
                "no instance at index {target} (pool size {})",
                self.pool.len()
            ))),
            (_, Err(e)) => Err(TransportError::Other(format!("payload encoding failed: {e}"))),
        };

        let delivery = SliceState::delivered(&result);
        let outcome = delivery.resolution().unwrap_or(SliceState::Requeued);
        let committed = match outcome {
            SliceState::Acked => self.sink.ack_all(slice).await,
            _ => self.sink.requeue_all(slice).await,
        };
        committed.map_err(|source| DispatchError::Queue {
            slice: index,
            source,
        })?;

        let report = SliceReport {
            index,
            message_ids: slice.iter().map(|m| m.id.clone()).collect(),
            instance: instance_name,
            delivery,
            outcome,
        };
        self.observer.slice_resolved(&report);
        Ok(report)
    }
}
