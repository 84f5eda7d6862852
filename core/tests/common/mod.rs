// Shared fixtures: throwaway HTTP servers standing in for Astra, OpenAI and Langflow
#![allow(dead_code)]

use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use worldwatch_core::llm::{LlmClient, LlmClientConfig};
use worldwatch_core::vector::{AstraCollection, AstraConfig};

pub const ASTRA_TOKEN: &str = "AstraCS:test";

/// Serve `app` on an ephemeral port and return its base URL
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn llm_client(base_url: &str) -> LlmClient {
    LlmClient::new(LlmClientConfig {
        base_url: format!("{base_url}/v1"),
        model: "gpt-4o".into(),
        api_key: Some("sk-test".into()),
        request_timeout_ms: 5_000,
        temperature: None,
    })
    .unwrap()
}

pub fn astra_collection(base_url: &str) -> AstraCollection {
    AstraCollection::new(AstraConfig {
        api_endpoint: base_url.to_string(),
        token: ASTRA_TOKEN.into(),
        keyspace: "default_keyspace".into(),
        collection: "news".into(),
        request_timeout_ms: 5_000,
    })
    .unwrap()
}

pub fn astra_document(i: usize, date: &str) -> Value {
    json!({
        "_id": format!("doc-{i}"),
        "content": format!("Article body number {i}"),
        "metadata": {
            "title": format!("Headline {i}"),
            "source": format!("https://news.example.org/{i}"),
            "date": date
        },
        "$similarity": 0.9 - (i as f64) * 0.05
    })
}

/// Chat Completions body whose message content is `content`
pub fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
    })
}

/// Streamed Chat Completions body delivering `parts` then `[DONE]`
pub fn completion_stream(parts: &[&str]) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "data: {}\n\n",
        json!({ "choices": [{ "delta": { "role": "assistant" } }] })
    ));
    for part in parts {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({ "choices": [{ "delta": { "content": part } }] })
        ));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn metadata_json(sentiment: Value) -> String {
    json!({
        "country": "France",
        "city": "Paris",
        "latitude": 48.85,
        "longitude": 2.35,
        "category": "Political",
        "sentiment": sentiment
    })
    .to_string()
}

/// Request bodies seen by a mock, in arrival order
pub type Captured = Arc<tokio::sync::Mutex<Vec<Value>>>;

pub fn captured() -> Captured {
    Arc::new(tokio::sync::Mutex::new(Vec::new()))
}
