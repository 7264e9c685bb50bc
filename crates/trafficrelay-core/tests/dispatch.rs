//! End-to-end behaviour of the consumer and dispatcher against in-memory
//! queue and instance doubles that share one event log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use trafficrelay_core::{
    Batch, BatchConsumer, DeliveryStatus, DeploymentConfig, DispatchObserver, InstancePool,
    InstanceSelector, Message, MessageAcker, NormalizeIssue, QueueError, QueueProducer,
    RetryAckSink, SliceDispatcher, SliceReport, SliceState, TransportError, WorkerInstance,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Deliver { instance: String, size: usize },
    Ack(String),
    Requeue(Value),
}

type Log = Arc<Mutex<Vec<Event>>>;

struct MemoryQueue {
    log: Log,
}

#[async_trait]
impl MessageAcker for MemoryQueue {
    async fn ack(&self, message: &Message) -> Result<(), QueueError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(Event::Ack(message.id.clone()));
        Ok(())
    }
}

#[async_trait]
impl QueueProducer for MemoryQueue {
    async fn send(&self, body: &Value) -> Result<(), QueueError> {
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(Event::Requeue(body.clone()));
        Ok(())
    }
    fn queue_name(&self) -> &str {
        "traffic-staging"
    }
}

type Script = Arc<Mutex<VecDeque<Result<u16, String>>>>;

/// Answers each delivery with the next response from a script shared by the
/// whole pool, so outcomes follow slice order whichever instance is picked.
struct ScriptedInstance {
    name: String,
    log: Log,
    script: Script,
    payloads: Mutex<Vec<Value>>,
}

#[async_trait]
impl WorkerInstance for ScriptedInstance {
    async fn deliver(&self, payload: Bytes) -> Result<DeliveryStatus, TransportError> {
        let decoded: Value = serde_json::from_slice(&payload).unwrap();
        let size = decoded["batchData"].as_array().unwrap().len();
        self.payloads.lock().unwrap().push(decoded);
        self.log.lock().unwrap().push(Event::Deliver {
            instance: self.name.clone(),
            size,
        });
        tokio::task::yield_now().await;
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(200));
        next.map(DeliveryStatus).map_err(TransportError::Http)
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Cycles through a fixed list of indices.
struct SequenceSelector(Mutex<VecDeque<usize>>);

impl InstanceSelector for SequenceSelector {
    fn select(&self, pool_size: usize) -> usize {
        let mut seq = self.0.lock().unwrap();
        let next = seq.pop_front().unwrap_or(0);
        seq.push_back(next);
        next % pool_size
    }
}

#[derive(Default)]
struct Recorder {
    reports: Mutex<Vec<SliceReport>>,
    issues: Mutex<Vec<(usize, NormalizeIssue)>>,
    diagnostics: Mutex<Vec<String>>,
}

impl DispatchObserver for Recorder {
    fn normalize_issue(&self, slice: usize, issue: &NormalizeIssue) {
        self.issues.lock().unwrap().push((slice, issue.clone()));
    }
    fn slice_resolved(&self, report: &SliceReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
    fn diagnostic_message(&self, _queue: &str, message: &Message) {
        self.diagnostics.lock().unwrap().push(message.id.clone());
    }
}

struct Harness {
    log: Log,
    instances: Vec<Arc<ScriptedInstance>>,
    recorder: Arc<Recorder>,
    consumer: BatchConsumer,
}

fn harness(pool_size: usize, script: Vec<Result<u16, String>>, picks: Vec<usize>) -> Harness {
    let mut deployment =
        DeploymentConfig::new("staging", pool_size, "traffic-staging", "http://rt-{index}");
    deployment.diagnostic_queues.push("traffic-inspection".into());

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let script: Script = Arc::new(Mutex::new(VecDeque::from(script)));
    let instances: Vec<Arc<ScriptedInstance>> = (0..pool_size)
        .map(|i| {
            Arc::new(ScriptedInstance {
                name: deployment.instance_name(i),
                log: log.clone(),
                script: script.clone(),
                payloads: Mutex::new(Vec::new()),
            })
        })
        .collect();
    let pool = InstancePool::new(
        instances
            .iter()
            .map(|i| i.clone() as Arc<dyn WorkerInstance>)
            .collect(),
    );

    let queue = Arc::new(MemoryQueue { log: log.clone() });
    let recorder = Arc::new(Recorder::default());
    let dispatcher = SliceDispatcher::new(pool, RetryAckSink::new(queue.clone(), queue))
        .with_selector(Arc::new(SequenceSelector(Mutex::new(VecDeque::from(picks)))))
        .with_observer(recorder.clone());

    Harness {
        log,
        instances,
        recorder,
        consumer: BatchConsumer::new(deployment, dispatcher),
    }
}

fn traffic_batch(n: usize) -> Batch {
    let messages = (0..n)
        .map(|i| Message::new(format!("m{i}"), json!(format!("{{\"seq\":{i}}}"))))
        .collect();
    Batch::new("traffic-staging", messages)
}

fn ids(range: std::ops::Range<usize>) -> Vec<Event> {
    range.map(|i| Event::Ack(format!("m{i}"))).collect()
}

#[tokio::test]
async fn twelve_messages_form_three_sequential_slices() {
    let h = harness(2, vec![], vec![0, 1, 0]);
    h.consumer.handle(&traffic_batch(12)).await.unwrap();

    let mut expected = vec![Event::Deliver {
        instance: "container/0".into(),
        size: 5,
    }];
    expected.extend(ids(0..5));
    expected.push(Event::Deliver {
        instance: "container/1".into(),
        size: 5,
    });
    expected.extend(ids(5..10));
    expected.push(Event::Deliver {
        instance: "container/0".into(),
        size: 2,
    });
    expected.extend(ids(10..12));

    assert_eq!(*h.log.lock().unwrap(), expected);

    let reports = h.recorder.reports.lock().unwrap();
    let sizes: Vec<usize> = reports.iter().map(|r| r.message_ids.len()).collect();
    assert_eq!(sizes, vec![5, 5, 2]);
    assert!(reports.iter().all(|r| r.outcome == SliceState::Acked));
}

#[tokio::test]
async fn failing_slice_is_requeued_and_others_still_acked() {
    let h = harness(3, vec![Ok(200), Ok(503), Err("connection reset".into())], vec![2]);
    let batch = traffic_batch(12);
    h.consumer.handle(&batch).await.unwrap();

    let log = h.log.lock().unwrap();
    let acked: Vec<&Event> = log.iter().filter(|e| matches!(e, Event::Ack(_))).collect();
    let requeued: Vec<Value> = log
        .iter()
        .filter_map(|e| match e {
            Event::Requeue(body) => Some(body.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(acked.len(), 5);
    let originals: Vec<Value> = batch.messages[5..].iter().map(|m| m.body.clone()).collect();
    assert_eq!(requeued, originals);

    let reports = h.recorder.reports.lock().unwrap();
    assert_eq!(reports[0].outcome, SliceState::Acked);
    assert_eq!(
        reports[1].delivery,
        SliceState::DeliveredFail {
            status: DeliveryStatus(503)
        }
    );
    assert_eq!(reports[1].outcome, SliceState::Requeued);
    assert!(matches!(reports[2].delivery, SliceState::DeliveryError { .. }));
    assert_eq!(reports[2].outcome, SliceState::Requeued);
    assert!(reports.iter().all(|r| r.instance == "container/2"));
}

#[tokio::test]
async fn payload_is_normalized_per_slice() {
    let h = harness(1, vec![], vec![0]);
    let batch = Batch::new(
        "traffic-staging",
        vec![
            Message::new("a", json!([[{"body": "{\"a\":1}"}]])),
            Message::new("b", json!("not json")),
            Message::new("c", json!({"path": "/x"})),
        ],
    );
    h.consumer.handle(&batch).await.unwrap();

    let payloads = h.instances[0].payloads.lock().unwrap();
    assert_eq!(
        payloads[0],
        json!({"batchData": [{"a": 1}, "not json", {"path": "/x"}]})
    );

    let issues = h.recorder.issues.lock().unwrap();
    assert_eq!(issues.len(), 1);
    assert!(matches!(issues[0], (0, NormalizeIssue::ItemDecode { index: 1, .. })));
}

#[tokio::test]
async fn diagnostic_queue_acks_without_dispatch() {
    let h = harness(2, vec![Ok(500)], vec![0]);
    let mut batch = traffic_batch(7);
    batch.queue = "traffic-inspection".into();
    h.consumer.handle(&batch).await.unwrap();

    let log = h.log.lock().unwrap();
    assert_eq!(*log, ids(0..7));
    assert!(h.instances.iter().all(|i| i.payloads.lock().unwrap().is_empty()));
    assert_eq!(h.recorder.diagnostics.lock().unwrap().len(), 7);
    assert!(h.recorder.reports.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_queue_is_still_dispatched() {
    let h = harness(1, vec![], vec![0]);
    let mut batch = traffic_batch(3);
    batch.queue = "other".into();
    h.consumer.handle(&batch).await.unwrap();
    assert_eq!(h.instances[0].payloads.lock().unwrap().len(), 1);
}
