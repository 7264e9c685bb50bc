//! Inbound batch entry point.

use crate::config::DeploymentConfig;
use crate::dispatcher::SliceDispatcher;
use crate::error::DispatchError;
use crate::message::Batch;

/// Routes inbound batches for one deployment.
///
/// Batches from a diagnostic queue are logged and acked without touching the
/// instance pool; everything else goes through the [`SliceDispatcher`].
#[derive(Clone)]
pub struct BatchConsumer {
    deployment: DeploymentConfig,
    dispatcher: SliceDispatcher,
}

impl BatchConsumer {
    pub fn new(deployment: DeploymentConfig, dispatcher: SliceDispatcher) -> Self {
        Self {
            deployment,
            dispatcher,
        }
    }

    pub fn deployment(&self) -> &DeploymentConfig {
        &self.deployment
    }

    pub fn dispatcher(&self) -> &SliceDispatcher {
        &self.dispatcher
    }

    /// Process one batch to completion.
    pub async fn handle(&self, batch: &Batch) -> Result<(), DispatchError> {
        if self.deployment.is_diagnostic(&batch.queue) {
            return self.pass_through(batch).await;
        }
        if batch.queue != self.deployment.traffic_queue {
            tracing::warn!(
                deployment = %self.deployment.name,
                queue = %batch.queue,
                expected = %self.deployment.traffic_queue,
                "batch from unexpected queue, dispatching anyway"
            );
        }
        self.dispatcher.dispatch(&batch.messages).await
    }

    async fn pass_through(&self, batch: &Batch) -> Result<(), DispatchError> {
        tracing::info!(
            deployment = %self.deployment.name,
            queue = %batch.queue,
            messages = batch.len(),
            "diagnostic pass-through"
        );
        let observer = self.dispatcher.observer();
        for message in &batch.messages {
            observer.diagnostic_message(&batch.queue, message);
            self.dispatcher
                .sink()
                .ack(message)
                .await
                .map_err(DispatchError::Diagnostic)?;
        }
        Ok(())
    }
}
