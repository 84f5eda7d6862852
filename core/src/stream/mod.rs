//! Stream Reader: drains the subscribed topic into the session event log.
//!
//! This module provides:
//! - `MessageConsumer` trait over a subscribed queue consumer
//! - `PulsarConsumer` speaking the Pulsar WebSocket consumer API
//! - `InMemoryQueue`/`InMemoryConsumer` for offline runs and tests
//! - `StreamReader` running drain cycles, and `Poller` repeating them in the background

mod memory;
mod poller;
mod pulsar;

pub use memory::{InMemoryConsumer, InMemoryQueue};
pub use poller::Poller;
pub use pulsar::{PulsarConfig, PulsarConsumer, TopicName};

use crate::dashboard::{UpdateBroadcaster, UpdateView};
use crate::event::{Event, EventLog, StreamPayload};
use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default wait for a single receive before a drain cycle ends
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// A message received from the queue, not yet acknowledged
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub id: String,
    pub data: Vec<u8>,
    pub publish_time: Option<String>,
}

/// Subscribed consumer of a message queue topic
#[async_trait]
pub trait MessageConsumer: Send {
    /// Wait up to `timeout` for one message; `None` when the wait elapsed
    async fn receive(&mut self, timeout: Duration) -> Result<Option<QueueMessage>>;

    async fn acknowledge(&mut self, message: &QueueMessage) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Outcome of one drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub appended: usize,
    pub rejected: usize,
}

pub struct StreamReader {
    consumer: Mutex<Box<dyn MessageConsumer>>,
    log: RwLock<EventLog>,
    receive_timeout: Duration,
    broadcaster: Option<UpdateBroadcaster>,
}

impl StreamReader {
    pub fn new(consumer: Box<dyn MessageConsumer>) -> Self {
        Self {
            consumer: Mutex::new(consumer),
            log: RwLock::new(EventLog::new()),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            broadcaster: None,
        }
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Publish a fresh view to the dashboard after every append
    pub fn with_broadcaster(mut self, broadcaster: UpdateBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Receive until a wait times out with no message.
    ///
    /// Each decoded message is appended, acknowledged and rendered before the
    /// next receive. Messages that are not a valid event are acknowledged and
    /// skipped so the broker does not redeliver them.
    pub async fn drain_cycle(&self) -> Result<DrainSummary> {
        let mut consumer = self.consumer.lock().await;
        let mut summary = DrainSummary::default();

        while let Some(message) = consumer.receive(self.receive_timeout).await? {
            match StreamPayload::from_slice(&message.data) {
                Ok(payload) => {
                    let view = {
                        let mut log = self.log.write().await;
                        let event = log.append(payload);
                        debug!(
                            target: "stream",
                            count = event.count,
                            title = %event.payload.title,
                            published = message.publish_time.as_deref().unwrap_or("-"),
                            "Appended stream event"
                        );
                        UpdateView::from_log(&log)
                    };
                    consumer.acknowledge(&message).await?;
                    summary.appended += 1;
                    if let Some(broadcaster) = &self.broadcaster {
                        broadcaster.broadcast(view);
                    }
                }
                Err(e) => {
                    warn!(
                        target: "stream",
                        message_id = %message.id,
                        error = %e,
                        "Skipping malformed stream message"
                    );
                    consumer.acknowledge(&message).await?;
                    summary.rejected += 1;
                }
            }
        }

        if summary.appended > 0 || summary.rejected > 0 {
            info!(
                target: "stream",
                appended = summary.appended,
                rejected = summary.rejected,
                "Drain cycle finished"
            );
        }
        Ok(summary)
    }

    /// Current rendering of the real-time panel
    pub async fn view(&self) -> UpdateView {
        UpdateView::from_log(&*self.log.read().await)
    }

    /// Up to `n` most recent events, newest first
    pub async fn latest(&self, n: usize) -> Vec<Event> {
        self.log.read().await.latest(n).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.is_empty()
    }

    pub async fn close(&self) -> Result<()> {
        self.consumer.lock().await.close().await
    }
}
