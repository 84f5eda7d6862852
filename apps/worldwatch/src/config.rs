use std::fs;
use std::path::Path;

use worldwatch_core::dashboard::DashboardConfig;
use worldwatch_core::stream::PulsarConfig;
use worldwatch_core::vector::AstraConfig;
use worldwatch_core::{FlowClientConfig, LlmClientConfig, Result, WorldwatchError};

/// Everything the dashboard needs to reach its services
#[derive(Clone, Debug)]
pub struct WorldwatchConfig {
    pub pulsar: PulsarConfig,
    pub astra: AstraConfig,
    pub llm: LlmClientConfig,
    pub flow: FlowClientConfig,
    pub dashboard: DashboardConfig,
}

impl Default for WorldwatchConfig {
    fn default() -> Self {
        // Each section's Default already reads its environment variables
        Self {
            pulsar: PulsarConfig::default(),
            astra: AstraConfig::default(),
            llm: LlmClientConfig::default(),
            flow: FlowClientConfig::default(),
            dashboard: DashboardConfig::from_env(),
        }
    }
}

impl WorldwatchConfig {
    /// Load configuration from the secrets file (path via WORLDWATCH_SECRETS or ./secrets.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("WORLDWATCH_SECRETS").unwrap_or_else(|_| "secrets.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "worldwatch", path = %path.display(), "No secrets file found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<SecretsToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "worldwatch", error = %e, "Failed to parse secrets file; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "worldwatch", error = %e, "Failed to read secrets file; using defaults");
                default
            }
        }
    }

    /// Fail fast when a service cannot be reached with what was configured
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.pulsar.service_url.is_empty() {
            missing.push("PULSAR_SERVICE");
        }
        if self.pulsar.topic.is_empty() {
            missing.push("PULSAR_TOPIC");
        }
        if self.astra.api_endpoint.is_empty() {
            missing.push("ASTRA_DB_API_ENDPOINT");
        }
        if self.astra.token.is_empty() {
            missing.push("ASTRA_DB_APPLICATION_TOKEN");
        }
        if self.astra.collection.is_empty() {
            missing.push("ASTRA_COLLECTION");
        }
        if self.llm.api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(WorldwatchError::ConfigError(format!(
                "missing required secrets: {}",
                missing.join(", ")
            )))
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

/// Flat secrets file using the same keys as the environment
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct SecretsToml {
    pub pulsar_service: Option<String>,
    pub pulsar_token: Option<String>,
    pub pulsar_topic: Option<String>,
    pub pulsar_subscription: Option<String>,
    pub pulsar_receive_timeout_ms: Option<u64>,
    pub astra_db_api_endpoint: Option<String>,
    pub astra_db_application_token: Option<String>,
    pub astra_keyspace: Option<String>,
    pub astra_collection: Option<String>,
    pub astra_timeout_ms: Option<u64>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_timeout_ms: Option<u64>,
    pub langflow_token: Option<String>,
    pub langflow_timeout_ms: Option<u64>,
    pub worldwatch_host: Option<String>,
    pub worldwatch_port: Option<u16>,
    pub worldwatch_poll_interval_ms: Option<u64>,
}

impl SecretsToml {
    fn overlay(self, mut base: WorldwatchConfig) -> WorldwatchConfig {
        let flow_token_set = self.langflow_token.is_some()
            || std::env::var("LANGFLOW_TOKEN").is_ok_and(|v| !v.is_empty());
        if let Some(v) = self.pulsar_service {
            base.pulsar.service_url = v;
        }
        if let Some(v) = self.pulsar_token {
            base.pulsar.token = Some(v);
        }
        if let Some(v) = self.pulsar_topic {
            base.pulsar.topic = v;
        }
        if let Some(v) = self.pulsar_subscription {
            base.pulsar.subscription = v;
        }
        if let Some(v) = self.pulsar_receive_timeout_ms {
            base.pulsar.receive_timeout_ms = v;
        }
        if let Some(v) = self.astra_db_api_endpoint {
            base.astra.api_endpoint = v;
        }
        if let Some(v) = self.astra_db_application_token {
            base.astra.token = v;
        }
        if let Some(v) = self.astra_keyspace {
            base.astra.keyspace = v;
        }
        if let Some(v) = self.astra_collection {
            base.astra.collection = v;
        }
        if let Some(v) = self.astra_timeout_ms {
            base.astra.request_timeout_ms = v;
        }
        if let Some(v) = self.openai_base_url {
            base.llm.base_url = v;
        }
        if let Some(v) = self.openai_model {
            base.llm.model = v;
        }
        if let Some(v) = self.openai_api_key {
            base.llm.api_key = Some(v);
        }
        if let Some(v) = self.openai_timeout_ms {
            base.llm.request_timeout_ms = v;
        }
        if let Some(v) = self.langflow_token {
            base.flow.token = Some(v);
        }
        if let Some(v) = self.langflow_timeout_ms {
            base.flow.request_timeout_ms = v;
        }
        if let Some(v) = self.worldwatch_host {
            base.dashboard.host = v;
        }
        if let Some(v) = self.worldwatch_port {
            base.dashboard.port = v;
        }
        if let Some(v) = self.worldwatch_poll_interval_ms {
            base.dashboard.poll_interval_ms = v;
        }
        // Flows run on the same Astra account unless told otherwise
        if !flow_token_set {
            base.flow.token = Some(base.astra.token.clone()).filter(|t| !t.is_empty());
        }
        base
    }
}
