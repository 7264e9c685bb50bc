//! Queue message and batch types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single message delivered by the inbound queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Transport-assigned identifier.
    pub id: String,
    /// Untyped payload, forwarded and requeued as-is.
    pub body: Value,
    /// Number of times the transport has delivered this message.
    #[serde(default = "first_attempt")]
    pub attempts: u32,
}

fn first_attempt() -> u32 {
    1
}

impl Message {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
            attempts: 1,
        }
    }
}

/// An ordered group of messages delivered together from one source queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Name of the queue the batch came from.
    pub queue: String,
    pub messages: Vec<Message>,
}

impl Batch {
    pub fn new(queue: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            queue: queue.into(),
            messages,
        }
    }

    /// Build a batch from raw bodies, numbering message ids from zero.
    pub fn from_bodies(queue: impl Into<String>, bodies: Vec<Value>) -> Self {
        let messages = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Message::new(i.to_string(), body))
            .collect();
        Self::new(queue, messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
