//! trafficrelay-http — HTTP transport for TrafficRelay worker instances.
//!
//! - [`HttpWorkerInstance`] — `WorkerInstance` that POSTs slices to `{base}/upload`
//! - [`pool_for`] — builds a deployment's instance pool on one shared client

pub mod client;
pub mod pool;

pub use client::{HttpClientConfig, HttpWorkerInstance, UPLOAD_PATH};
pub use pool::pool_for;
