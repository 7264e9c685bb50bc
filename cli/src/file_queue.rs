//! Local queue transport for the `dispatch` command.
//!
//! Acks are counted and logged; requeued bodies are written as NDJSON so
//! they can be fed back in as a later batch.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use trafficrelay_core::{Message, MessageAcker, QueueError, QueueProducer};

pub struct FileQueue {
    name: String,
    out: Mutex<Box<dyn Write + Send>>,
    acked: AtomicUsize,
    requeued: AtomicUsize,
}

impl FileQueue {
    pub fn new(name: impl Into<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            name: name.into(),
            out: Mutex::new(out),
            acked: AtomicUsize::new(0),
            requeued: AtomicUsize::new(0),
        }
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::Relaxed)
    }

    pub fn requeued(&self) -> usize {
        self.requeued.load(Ordering::Relaxed)
    }

    fn send_error(&self, reason: impl ToString) -> QueueError {
        QueueError::Send {
            queue: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MessageAcker for FileQueue {
    async fn ack(&self, message: &Message) -> Result<(), QueueError> {
        self.acked.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id = %message.id, "acked");
        Ok(())
    }
}

#[async_trait]
impl QueueProducer for FileQueue {
    async fn send(&self, body: &Value) -> Result<(), QueueError> {
        let line = serde_json::to_string(body)?;
        let mut out = self.out.lock().map_err(|e| self.send_error(e))?;
        writeln!(out, "{line}").map_err(|e| self.send_error(e))?;
        out.flush().map_err(|e| self.send_error(e))?;
        self.requeued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn requeue_writes_ndjson() {
        let buf = Shared::default();
        let queue = FileQueue::new("traffic", Box::new(buf.clone()));
        queue.send(&json!({"a": 1})).await.unwrap();
        queue.send(&json!("raw")).await.unwrap();
        queue.ack(&Message::new("m0", json!(null))).await.unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "{\"a\":1}\n\"raw\"\n");
        assert_eq!(queue.requeued(), 2);
        assert_eq!(queue.acked(), 1);
    }
}
