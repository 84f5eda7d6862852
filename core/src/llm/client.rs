use crate::{Result, WorldwatchError};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, error};

use super::sse::SseDecoder;

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1
    pub model: String,    // e.g., gpt-4o
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: Option<f32>,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
            // Covers a whole streamed answer, not just time to first byte
            request_timeout_ms: std::env::var("OPENAI_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(120_000),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One entry of a chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// JSON schema the model output must conform to
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: &'static str,
    pub schema: Value,
}

/// Minimal response containing the assistant text
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<Value>,
}

/// Content deltas of a streamed completion, in arrival order
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// HTTP client for OpenAI-compatible Chat Completions
#[derive(Clone)]
pub struct LlmClient {
    pub(crate) http: Client,
    pub(crate) cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| WorldwatchError::LlmError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    fn chat_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.cfg.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, messages: &[ChatMessage]) -> Value {
        let mut body = json!({
            "model": self.cfg.model,
            "messages": messages,
        });
        if let Some(t) = self.cfg.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let url = self.chat_url();
        debug!(target: "llm_client", model = %self.cfg.model, "POST {}", url);

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(body)
            .send()
            .await
            .map_err(|e| WorldwatchError::LlmError(format!("Chat Completions HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Chat Completions error");
            return Err(WorldwatchError::LlmError(format!(
                "Chat Completions error: status={} body={}",
                status, text
            )));
        }
        Ok(resp)
    }

    async fn complete_body(&self, body: Value) -> Result<LlmResponse> {
        let resp = self.post(&body).await?;
        let val: Value = resp.json().await.map_err(|e| {
            WorldwatchError::LlmError(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        if let Some(refusal) = extract_refusal(&val) {
            return Err(WorldwatchError::LlmError(format!(
                "Model refused the request: {refusal}"
            )));
        }
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            WorldwatchError::LlmError(
                "Missing choices[0].message.content in chat completions".into(),
            )
        })?;
        Ok(LlmResponse {
            text,
            model: val
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            usage: val.get("usage").cloned(),
        })
    }

    /// Single, non-streamed completion
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        self.complete_body(self.request_body(messages)).await
    }

    /// Completion whose content is constrained to `schema`.
    ///
    /// Returns the raw JSON text; callers parse it into their target type.
    pub async fn complete_structured(
        &self,
        messages: &[ChatMessage],
        schema: &ResponseSchema,
    ) -> Result<LlmResponse> {
        let mut body = self.request_body(messages);
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": schema.name,
                "strict": true,
                "schema": schema.schema,
            }
        });
        self.complete_body(body).await
    }

    /// Streamed completion as a pull-based stream of content deltas.
    ///
    /// Dropping the stream drops the response body and aborts the request.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<DeltaStream> {
        let mut body = self.request_body(messages);
        body["stream"] = json!(true);
        let resp = self.post(&body).await?;
        Ok(Box::pin(delta_stream(resp.bytes_stream())))
    }
}

/// Turn a Chat Completions SSE body into content deltas
pub fn delta_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        let mut body = Box::pin(body);
        let mut done = false;

        while !done {
            let chunk = match body.next().await {
                Some(chunk) => chunk.map_err(|e| {
                    WorldwatchError::LlmError(format!("Stream read failed: {e}"))
                })?,
                None => break,
            };
            for data in decoder.push(chunk.as_ref()) {
                if data == "[DONE]" {
                    done = true;
                    break;
                }
                if let Some(delta) = parse_delta(&data)? {
                    yield delta;
                }
            }
        }

        if !done {
            if let Some(data) = decoder.finish() {
                if data != "[DONE]" {
                    if let Some(delta) = parse_delta(&data)? {
                        yield delta;
                    }
                }
            }
        }
    }
}

/// Content delta of one streamed chunk; `None` for role-only or empty chunks
fn parse_delta(data: &str) -> Result<Option<String>> {
    let val: Value = serde_json::from_str(data)?;
    if let Some(err) = val.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(WorldwatchError::LlmError(format!(
            "Stream returned an error: {message}"
        )));
    }
    Ok(val
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string()))
}

fn extract_text_from_chat_completions(v: &Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn extract_refusal(v: &Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("refusal")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[tokio::test]
    async fn delta_stream_yields_content_until_done() {
        let body = format!(
            "data: {}\n\n{}{}data: [DONE]\n\n{}",
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            chunk("Hel"),
            chunk("lo"),
            chunk("ignored")
        );
        let parts: Vec<std::result::Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        let deltas: Vec<String> = delta_stream(stream::iter(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn delta_stream_surfaces_error_events() {
        let body = format!(
            "{}data: {}\n\n",
            chunk("partial"),
            json!({"error": {"message": "rate limited"}})
        );
        let parts: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
            vec![Ok(body.into_bytes())];
        let items: Vec<Result<String>> = delta_stream(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(items[1], Err(WorldwatchError::LlmError(_))));
    }

    #[test]
    fn request_body_serializes_roles() {
        let client = LlmClient::new(LlmClientConfig {
            base_url: "http://localhost:9/v1".into(),
            model: "gpt-4o".into(),
            api_key: None,
            request_timeout_ms: 1000,
            temperature: None,
        })
        .unwrap();
        let body = client.request_body(&[ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body.get("temperature").is_none());
    }
}
