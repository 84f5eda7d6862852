// Dashboard module - the news dashboard page and its JSON/SSE API
//
// Provides a simple HTTP server with SSE for streaming updates and answers to a web UI.

mod api;
mod error;
mod event_stream;
mod static_assets;

pub use api::DashboardServer;
pub use error::{map_error, ApiError, ErrorEnvelope};
pub use event_stream::{UpdateBroadcaster, UpdateView};

use std::time::Duration;

/// Dashboard configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardConfig {
    pub port: u16,
    pub host: String,
    /// Pause between drain cycles while subscribed
    pub poll_interval_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: 8501,
            host: "127.0.0.1".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: std::env::var("WORLDWATCH_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            host: std::env::var("WORLDWATCH_HOST")
                .ok()
                .filter(|h| !h.is_empty())
                .unwrap_or(defaults.host),
            poll_interval_ms: std::env::var("WORLDWATCH_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.poll_interval_ms),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
