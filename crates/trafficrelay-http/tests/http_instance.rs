use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trafficrelay_core::{
    Batch, BatchConsumer, DeploymentConfig, Message, MessageAcker, QueueError, QueueProducer,
    RetryAckSink, SliceDispatcher, TransportError, WorkerInstance,
};
use trafficrelay_http::{pool_for, HttpClientConfig, HttpWorkerInstance};

#[tokio::test]
async fn posts_json_to_upload_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"batchData": [{"a": 1}]})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ignored"))
        .expect(1)
        .mount(&server)
        .await;

    let instance =
        HttpWorkerInstance::new("container/0", &server.uri(), HttpClientConfig::default())
            .unwrap();
    let status = instance
        .deliver(Bytes::from_static(br#"{"batchData":[{"a":1}]}"#))
        .await
        .unwrap();
    assert!(status.is_ok());
}

#[tokio::test]
async fn non_success_status_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let instance =
        HttpWorkerInstance::new("container/0", &server.uri(), HttpClientConfig::default())
            .unwrap();
    let status = instance.deliver(Bytes::from_static(b"{}")).await.unwrap();
    assert_eq!(status.0, 503);
    assert!(!status.is_ok());
}

#[tokio::test]
async fn slow_instance_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let instance = HttpWorkerInstance::new(
        "container/0",
        &server.uri(),
        HttpClientConfig {
            request_timeout: Duration::from_millis(100),
        },
    )
    .unwrap();
    let err = instance.deliver(Bytes::from_static(b"{}")).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 100 }));
}

#[tokio::test]
async fn unreachable_instance_is_http_error() {
    // Port 9 (discard) is assumed closed on test hosts.
    let instance =
        HttpWorkerInstance::new("container/0", "http://127.0.0.1:9", HttpClientConfig::default())
            .unwrap();
    let err = instance.deliver(Bytes::from_static(b"{}")).await.unwrap_err();
    assert!(err.is_transient());
}

#[derive(Default)]
struct MemoryQueue {
    acked: Mutex<Vec<String>>,
    sent: Mutex<Vec<Value>>,
}

#[async_trait]
impl MessageAcker for MemoryQueue {
    async fn ack(&self, message: &Message) -> Result<(), QueueError> {
        self.acked.lock().unwrap().push(message.id.clone());
        Ok(())
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn send(&self, body: &Value) -> Result<(), QueueError> {
        self.sent.lock().unwrap().push(body.clone());
        Ok(())
    }
    fn queue_name(&self) -> &str {
        "traffic"
    }
}

#[tokio::test]
async fn consumer_over_http_acks_and_requeues() {
    let server = MockServer::start().await;
    // First slice accepted, second rejected.
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let deployment = DeploymentConfig::new("staging", 1, "traffic", server.uri());
    let queue = Arc::new(MemoryQueue::default());
    let dispatcher = SliceDispatcher::new(
        pool_for(&deployment).unwrap(),
        RetryAckSink::new(queue.clone(), queue.clone()),
    );
    let consumer = BatchConsumer::new(deployment, dispatcher);

    let bodies: Vec<Value> = (0..7).map(|i| json!({"body": format!("{{\"n\":{i}}}")})).collect();
    consumer
        .handle(&Batch::from_bodies("traffic", bodies.clone()))
        .await
        .unwrap();

    assert_eq!(*queue.acked.lock().unwrap(), vec!["0", "1", "2", "3", "4"]);
    assert_eq!(*queue.sent.lock().unwrap(), bodies[5..].to_vec());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["batchData"][0], json!({"n": 0}));
}
