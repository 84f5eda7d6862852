//! Pulsar consumer over the WebSocket API
//!
//! Connects to `{service}/ws/v2/consumer/{domain}/{tenant}/{namespace}/{topic}/{subscription}`
//! with a bearer token. Every delivery is a JSON frame carrying a `messageId`
//! and a base64 `payload`; acknowledging sends the `messageId` back.
use super::{MessageConsumer, QueueMessage};
use crate::{Result, WorldwatchError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Connection settings for the Pulsar WebSocket consumer, loaded from environment variables
#[derive(Debug, Clone)]
pub struct PulsarConfig {
    /// WebSocket service URL, e.g. `wss://pulsar.example.com:8964`
    pub service_url: String,
    pub token: Option<String>,
    /// Fully qualified topic, e.g. `persistent://tenant/namespace/topic`
    pub topic: String,
    pub subscription: String,
    /// Wait for a single receive before a drain cycle ends
    pub receive_timeout_ms: u64,
}

impl Default for PulsarConfig {
    fn default() -> Self {
        Self {
            service_url: std::env::var("PULSAR_SERVICE").unwrap_or_default(),
            token: std::env::var("PULSAR_TOKEN").ok().filter(|s| !s.is_empty()),
            topic: std::env::var("PULSAR_TOPIC").unwrap_or_default(),
            subscription: std::env::var("PULSAR_SUBSCRIPTION")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "worldwatch-subscription".to_string()),
            receive_timeout_ms: std::env::var("PULSAR_RECEIVE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1000),
        }
    }
}

impl PulsarConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Full consumer endpoint for this topic and subscription
    pub fn consumer_url(&self) -> Result<String> {
        let base = websocket_base(&self.service_url)?;
        let topic: TopicName = self.topic.parse()?;
        if self.subscription.is_empty() {
            return Err(WorldwatchError::ConfigError(
                "Pulsar subscription name is empty".into(),
            ));
        }
        Ok(format!(
            "{}/ws/v2/consumer/{}/{}",
            base.trim_end_matches('/'),
            topic.path(),
            self.subscription
        ))
    }
}

/// Map a configured service URL onto its WebSocket scheme
fn websocket_base(service_url: &str) -> Result<String> {
    let url = service_url.trim();
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else if url.is_empty() {
        Err(WorldwatchError::ConfigError("PULSAR_SERVICE is not set".into()))
    } else {
        Err(WorldwatchError::ConfigError(format!(
            "PULSAR_SERVICE must be a WebSocket or HTTP URL, got `{url}`"
        )))
    }
}

/// Parsed Pulsar topic name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicName {
    pub persistent: bool,
    pub tenant: String,
    pub namespace: String,
    pub topic: String,
}

impl TopicName {
    /// `{domain}/{tenant}/{namespace}/{topic}` as used in WebSocket paths
    pub fn path(&self) -> String {
        let domain = if self.persistent {
            "persistent"
        } else {
            "non-persistent"
        };
        format!("{}/{}/{}/{}", domain, self.tenant, self.namespace, self.topic)
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domain = if self.persistent {
            "persistent"
        } else {
            "non-persistent"
        };
        write!(
            f,
            "{}://{}/{}/{}",
            domain, self.tenant, self.namespace, self.topic
        )
    }
}

impl FromStr for TopicName {
    type Err = WorldwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let (persistent, rest) = if let Some(rest) = s.strip_prefix("persistent://") {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix("non-persistent://") {
            (false, rest)
        } else {
            (true, s)
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let (tenant, namespace, topic) = match parts.as_slice() {
            [topic] => ("public", "default", *topic),
            [tenant, namespace, topic] => (*tenant, *namespace, *topic),
            _ => {
                return Err(WorldwatchError::ConfigError(format!(
                    "Invalid Pulsar topic `{s}`"
                )))
            }
        };
        if [tenant, namespace, topic].iter().any(|p| p.is_empty()) {
            return Err(WorldwatchError::ConfigError(format!(
                "Invalid Pulsar topic `{s}`"
            )));
        }

        Ok(Self {
            persistent,
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            topic: topic.to_string(),
        })
    }
}

/// Delivery frame pushed by the WebSocket consumer endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumerFrame {
    message_id: Option<String>,
    payload: Option<String>,
    publish_time: Option<String>,
}

pub struct PulsarConsumer {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PulsarConsumer {
    pub async fn connect(cfg: &PulsarConfig) -> Result<Self> {
        let url = cfg.consumer_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| WorldwatchError::StreamError(format!("Invalid consumer URL: {e}")))?;
        if let Some(token) = &cfg.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                WorldwatchError::ConfigError(format!("Invalid PULSAR_TOKEN header: {e}"))
            })?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| WorldwatchError::StreamError(format!("Pulsar connect failed: {e}")))?;
        info!(
            target: "pulsar",
            topic = %cfg.topic,
            subscription = %cfg.subscription,
            "Subscribed to Pulsar topic"
        );
        Ok(Self { socket })
    }

    /// Delivery carried by a frame, if any.
    ///
    /// A delivery whose payload is not base64 is still returned, with the raw
    /// payload as its data, so the reader rejects and acknowledges it.
    fn decode_frame(text: &str) -> Option<QueueMessage> {
        let frame: ConsumerFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(target: "pulsar", error = %e, "Ignoring unparseable frame");
                return None;
            }
        };
        let (Some(id), Some(payload)) = (frame.message_id, frame.payload) else {
            // Acks and other control replies carry no payload
            debug!(target: "pulsar", frame = %text, "Ignoring non-delivery frame");
            return None;
        };
        let data = match STANDARD.decode(payload.as_bytes()) {
            Ok(data) => data,
            Err(e) => {
                warn!(target: "pulsar", message_id = %id, error = %e, "Payload is not base64");
                payload.into_bytes()
            }
        };
        Some(QueueMessage {
            id,
            data,
            publish_time: frame.publish_time,
        })
    }
}

#[async_trait]
impl MessageConsumer for PulsarConsumer {
    async fn receive(&mut self, timeout: Duration) -> Result<Option<QueueMessage>> {
        let deadline = Instant::now() + timeout;
        loop {
            let next = match tokio::time::timeout_at(deadline, self.socket.next()).await {
                Ok(next) => next,
                Err(_) => return Ok(None),
            };
            let text = match next {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Close(frame))) => {
                    warn!(target: "pulsar", ?frame, "Pulsar closed the consumer socket");
                    return Err(WorldwatchError::StreamError(
                        "Pulsar consumer socket closed".into(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(WorldwatchError::StreamError(format!(
                        "Pulsar receive failed: {e}"
                    )))
                }
                None => {
                    return Err(WorldwatchError::StreamError(
                        "Pulsar consumer socket ended".into(),
                    ))
                }
            };
            if let Some(message) = Self::decode_frame(&text) {
                return Ok(Some(message));
            }
        }
    }

    async fn acknowledge(&mut self, message: &QueueMessage) -> Result<()> {
        let ack = json!({ "messageId": message.id }).to_string();
        self.socket
            .send(Message::Text(ack))
            .await
            .map_err(|e| WorldwatchError::StreamError(format!("Pulsar ack failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.socket
            .close(None)
            .await
            .map_err(|e| WorldwatchError::StreamError(format!("Pulsar close failed: {e}")))
    }
}
