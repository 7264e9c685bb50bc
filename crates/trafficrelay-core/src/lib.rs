//! trafficrelay-core — slice dispatch pipeline for traffic-capture queues.
//!
//! # Overview
//!
//! TrafficRelay consumes batches of traffic-capture messages, cuts them into
//! fixed-size slices and forwards each slice to one instance of a backend
//! worker pool. The core crate defines:
//!
//! - [`normalize()`] — flattening and JSON decoding of raw slice payloads
//! - [`InstanceSelector`] / [`InstancePool`] — uniform instance selection
//! - [`WorkerInstance`] — the delivery capability every backend implements
//! - [`RetryAckSink`] — ack / requeue side effects against the queue
//! - [`SliceDispatcher`] — sequential per-slice delivery and outcome handling
//! - [`BatchConsumer`] — inbound entry point with diagnostic pass-through
//! - [`config`] module — deployment configuration

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod instance;
pub mod message;
pub mod normalize;
pub mod observer;
pub mod selector;
pub mod sink;

pub use config::{DeploymentConfig, LogConfig, RelayConfig};
pub use consumer::BatchConsumer;
pub use dispatcher::{SliceDispatcher, SLICE_SIZE};
pub use error::{ConfigError, DispatchError, QueueError, TransportError};
pub use instance::{DeliveryStatus, InstancePool, WorkerInstance};
pub use message::{Batch, Message};
pub use normalize::{normalize, normalize_reported, Item, NormalizeIssue, NormalizedPayload};
pub use observer::{DispatchObserver, SliceReport, SliceState, TracingObserver};
pub use selector::{InstanceSelector, RandomSelector};
pub use sink::{MessageAcker, QueueProducer, RetryAckSink};
