//! External Chat Proxy: forwards chat turns to a user-supplied Langflow endpoint

use crate::{Result, WorldwatchError};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Location of the reply text in a flow run response
pub const REPLY_POINTER: &str = "/outputs/0/outputs/0/outputs/message/message/text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Ordered conversation for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatThread {
    turns: Vec<ChatTurn>,
}

impl ChatThread {
    pub fn push(&mut self, role: ChatRole, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Turns added after the first `from`
    pub fn since(&self, from: usize) -> &[ChatTurn] {
        self.turns.get(from..).unwrap_or_default()
    }

    pub fn extend_from(&mut self, turns: &[ChatTurn]) {
        self.turns.extend_from_slice(turns);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FlowClientConfig {
    /// Bearer token sent with every run; falls back to the Astra token
    pub token: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for FlowClientConfig {
    fn default() -> Self {
        let token = std::env::var("LANGFLOW_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| {
                std::env::var("ASTRA_DB_APPLICATION_TOKEN")
                    .ok()
                    .filter(|s| !s.is_empty())
            });
        Self {
            token,
            request_timeout_ms: std::env::var("LANGFLOW_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60_000),
        }
    }
}

/// Accept only absolute `http`/`https` URLs
pub fn validate_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| WorldwatchError::InvalidInput(format!("invalid flow endpoint: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WorldwatchError::InvalidInput(format!(
            "flow endpoint must be http or https, got `{other}`"
        ))),
    }
}

/// Reply text of a flow run response
pub fn extract_reply(body: &Value) -> Result<String> {
    body.pointer(REPLY_POINTER)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            WorldwatchError::MissingResponseField(
                "outputs[0].outputs[0].outputs.message.message.text".into(),
            )
        })
}

#[derive(Clone)]
pub struct FlowClient {
    http: Client,
    cfg: FlowClientConfig,
}

impl FlowClient {
    pub fn new(cfg: FlowClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| WorldwatchError::ProxyError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(FlowClientConfig::default())
    }

    /// Run the flow once with `input` and return its reply text
    pub async fn run(&self, endpoint: &str, input: &str) -> Result<String> {
        let url = validate_endpoint(endpoint)?;
        debug!(target: "chat_proxy", endpoint = %url, "POST flow run");

        let mut req = self.http.post(url).json(&json!({
            "input_value": input,
            "output_type": "chat",
            "input_type": "chat",
        }));
        if let Some(token) = &self.cfg.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WorldwatchError::ProxyError(format!("Flow request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(target: "chat_proxy", %status, body = %body, "Flow returned an error status");
            return Err(WorldwatchError::ProxyError(format!(
                "Flow run failed: status={status} body={body}"
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| WorldwatchError::ProxyError(format!("Failed to parse flow response: {e}")))?;
        extract_reply(&body)
    }

    /// Append the user turn, proxy it, and append the reply.
    ///
    /// On failure the user turn stays in the thread and no assistant turn is
    /// added.
    pub async fn send_turn(
        &self,
        thread: &mut ChatThread,
        endpoint: &str,
        message: &str,
    ) -> Result<()> {
        if message.trim().is_empty() {
            return Err(WorldwatchError::InvalidInput(
                "chat message must not be empty".into(),
            ));
        }
        validate_endpoint(endpoint)?;
        thread.push(ChatRole::User, message);
        let reply = self.run(endpoint, message).await?;
        info!(target: "chat_proxy", turns = thread.len() + 1, "Flow replied");
        thread.push(ChatRole::Assistant, reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_http() {
        assert!(validate_endpoint("https://flows.example.org/run/abc").is_ok());
        assert!(validate_endpoint(" http://localhost:7860/api/v1/run/x ").is_ok());
        assert!(validate_endpoint("ftp://example.org").is_err());
        assert!(validate_endpoint("example.org/run").is_err());
        assert!(validate_endpoint("").is_err());
    }

    #[test]
    fn new_turns_carry_over_to_thread() {
        let mut thread = ChatThread::default();
        thread.push(ChatRole::User, "hi");
        let mut draft = thread.clone();
        draft.push(ChatRole::Assistant, "hello");
        draft.push(ChatRole::User, "bye");

        thread.extend_from(draft.since(1));
        assert_eq!(thread, draft);
        assert!(draft.since(10).is_empty());
    }

    #[test]
    fn reply_is_read_from_nested_path() {
        let body = json!({
            "outputs": [{ "outputs": [{ "outputs": { "message": { "message": { "text": "hi there" } } } }] }]
        });
        assert_eq!(extract_reply(&body).unwrap(), "hi there");
    }

    #[test]
    fn missing_reply_path_is_typed_error() {
        let body = json!({ "outputs": [{ "outputs": [] }] });
        assert!(matches!(
            extract_reply(&body),
            Err(WorldwatchError::MissingResponseField(_))
        ));
    }

    #[test]
    fn thread_keeps_order() {
        let mut t = ChatThread::default();
        t.push(ChatRole::User, "q");
        t.push(ChatRole::Assistant, "a");
        assert_eq!(t.len(), 2);
        assert_eq!(t.turns()[0].role, ChatRole::User);
        assert_eq!(t.turns()[1].content, "a");
    }
}
