//! Ack / requeue side effects against the queue transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QueueError;
use crate::message::Message;

/// Permanently removes a delivered message from the inbound queue.
///
/// Acking an already-acked message must be harmless; that guarantee belongs
/// to the transport.
#[async_trait]
pub trait MessageAcker: Send + Sync {
    async fn ack(&self, message: &Message) -> Result<(), QueueError>;
}

/// Enqueues one body onto a queue for future delivery.
#[async_trait]
pub trait QueueProducer: Send + Sync {
    async fn send(&self, body: &Value) -> Result<(), QueueError>;

    /// Queue name, for logging.
    fn queue_name(&self) -> &str;
}

/// Applies a slice's terminal outcome, one message at a time, in order.
#[derive(Clone)]
pub struct RetryAckSink {
    acker: Arc<dyn MessageAcker>,
    producer: Arc<dyn QueueProducer>,
}

impl RetryAckSink {
    pub fn new(acker: Arc<dyn MessageAcker>, producer: Arc<dyn QueueProducer>) -> Self {
        Self { acker, producer }
    }

    pub async fn ack(&self, message: &Message) -> Result<(), QueueError> {
        self.acker.ack(message).await
    }

    /// Resubmit the message's original, unmodified body.
    pub async fn requeue_original_body(&self, message: &Message) -> Result<(), QueueError> {
        self.producer.send(&message.body).await
    }

    /// Ack every message; stops at the first failure.
    pub async fn ack_all(&self, messages: &[Message]) -> Result<(), QueueError> {
        for message in messages {
            self.ack(message).await?;
        }
        Ok(())
    }

    /// Requeue every message's body; stops at the first failure.
    pub async fn requeue_all(&self, messages: &[Message]) -> Result<(), QueueError> {
        for message in messages {
            self.requeue_original_body(message).await?;
        }
        tracing::debug!(
            queue = self.producer.queue_name(),
            count = messages.len(),
            "requeued slice"
        );
        Ok(())
    }
}
