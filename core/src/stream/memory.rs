// In-process queue used for offline runs and tests
use super::{MessageConsumer, QueueMessage};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// Publishing side of an in-memory topic
#[derive(Clone)]
pub struct InMemoryQueue {
    sender: mpsc::UnboundedSender<QueueMessage>,
    next_id: Arc<AtomicU64>,
    acknowledged: Arc<Mutex<Vec<String>>>,
}

/// Consuming side of an in-memory topic
pub struct InMemoryConsumer {
    receiver: mpsc::UnboundedReceiver<QueueMessage>,
    acknowledged: Arc<Mutex<Vec<String>>>,
}

impl InMemoryQueue {
    pub fn pair() -> (Self, InMemoryConsumer) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let acknowledged = Arc::new(Mutex::new(Vec::new()));
        let queue = Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
            acknowledged: Arc::clone(&acknowledged),
        };
        (
            queue,
            InMemoryConsumer {
                receiver,
                acknowledged,
            },
        )
    }

    /// Enqueue a raw message body and return its id
    pub fn publish(&self, data: impl Into<Vec<u8>>) -> String {
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        // A dropped consumer just means nobody will read it
        let _ = self.sender.send(QueueMessage {
            id: id.clone(),
            data: data.into(),
            publish_time: Some(chrono::Utc::now().to_rfc3339()),
        });
        id
    }

    pub fn publish_json(&self, value: &serde_json::Value) -> String {
        self.publish(value.to_string())
    }

    /// Ids acknowledged by the consumer, in acknowledgement order
    pub async fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().await.clone()
    }
}

#[async_trait]
impl MessageConsumer for InMemoryConsumer {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<QueueMessage>> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(message) => Ok(message),
            Err(_) => Ok(None),
        }
    }

    async fn acknowledge(&mut self, message: &QueueMessage) -> Result<()> {
        self.acknowledged.lock().await.push(message.id.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.receiver.close();
        Ok(())
    }
}
