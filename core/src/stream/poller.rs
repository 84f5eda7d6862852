// Background subscription: repeat drain cycles while the toggle is on
use super::StreamReader;
use crate::WorldwatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct Poller {
    reader: Arc<StreamReader>,
    interval: Duration,
    active: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(reader: Arc<StreamReader>, interval: Duration) -> Self {
        Self {
            reader,
            interval,
            active: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Start polling; returns false if it was already running
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }

        let reader = Arc::clone(&self.reader);
        let active = Arc::clone(&self.active);
        let interval = self.interval;
        *handle = Some(tokio::spawn(async move {
            info!(target: "stream", interval_ms = interval.as_millis() as u64, "Subscription started");
            while active.load(Ordering::Relaxed) {
                match reader.drain_cycle().await {
                    Ok(summary) => {
                        debug!(target: "stream", appended = summary.appended, "Poll cycle complete")
                    }
                    Err(e @ WorldwatchError::StreamError(_)) => {
                        // Consumer connection is gone
                        error!(target: "stream", error = %e, "Consumer lost, stopping subscription");
                        active.store(false, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => warn!(target: "stream", error = %e, "Drain cycle failed"),
                }
                tokio::time::sleep(interval).await;
            }
        }));
        true
    }

    /// Stop polling; returns false if it was not running
    pub async fn stop(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(h) = handle.take() {
            h.abort();
        }
        info!(target: "stream", "Subscription stopped");
        true
    }
}
