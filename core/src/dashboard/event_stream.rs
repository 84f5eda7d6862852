// Real-time panel streaming for Dashboard
//
// Uses tokio broadcast channel to push re-rendered views to multiple SSE clients

use crate::event::EventLog;
use crate::render::render_updates;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Rendered state of the real-time panel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateView {
    /// Total events received this session
    pub total: usize,
    /// Markdown for the most recent events, newest first
    pub markdown: String,
    /// Render time (ISO 8601)
    pub rendered_at: String,
}

impl UpdateView {
    pub fn from_log(log: &EventLog) -> Self {
        Self {
            total: log.len(),
            markdown: render_updates(log),
            rendered_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Broadcaster of panel views to Dashboard clients
#[derive(Clone)]
pub struct UpdateBroadcaster {
    sender: broadcast::Sender<UpdateView>,
}

impl UpdateBroadcaster {
    /// Create a new broadcaster with buffer size
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a view to all subscribers
    pub fn broadcast(&self, view: UpdateView) {
        // Ignore error if no subscribers
        let _ = self.sender.send(view);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateView> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        // Only the latest view matters; a small buffer is enough for slow clients
        Self::new(64)
    }
}
