//! Error types for delivery, queue and configuration operations.

use thiserror::Error;

/// Errors raised by a [`WorkerInstance`](crate::WorkerInstance) delivery.
///
/// A non-2xx response is *not* a transport error; it is reported through
/// [`DeliveryStatus`](crate::DeliveryStatus).
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, reset, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The instance address could not be resolved.
    #[error("Invalid instance endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if the failure is likely transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

/// Errors raised by the queue transport while acking or requeueing.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Acknowledging a message failed.
    #[error("Failed to ack message {message_id}: {reason}")]
    Ack { message_id: String, reason: String },

    /// Sending a body back to the queue failed.
    #[error("Failed to send to queue `{queue}`: {reason}")]
    Send { queue: String, reason: String },

    /// The body could not be serialized for the queue.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that abort a batch invocation.
///
/// Delivery failures never show up here; they are absorbed by requeueing
/// the slice.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Ack or requeue side effect failed; remaining slices were not processed.
    #[error("Queue error on slice {slice}: {source}")]
    Queue {
        slice: usize,
        #[source]
        source: QueueError,
    },

    /// Ack failed during diagnostic pass-through.
    #[error("Diagnostic pass-through failed: {0}")]
    Diagnostic(#[source] QueueError),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deployment `{deployment}`: {reason}")]
    Invalid { deployment: String, reason: String },

    #[error("Duplicate deployment name: {0}")]
    DuplicateDeployment(String),

    #[error("Unknown deployment: {0}")]
    UnknownDeployment(String),
}
