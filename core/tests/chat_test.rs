mod common;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use common::{captured, spawn, Captured};
use serde_json::{json, Value};
use worldwatch_core::{ChatRole, ChatThread, FlowClient, FlowClientConfig, Result, WorldwatchError};

fn client() -> FlowClient {
    FlowClient::new(FlowClientConfig {
        token: Some("AstraCS:flow".into()),
        request_timeout_ms: 5_000,
    })
    .unwrap()
}

async fn flow_mock(reply: Value, seen: Captured) -> String {
    async fn run(
        State((reply, seen)): State<(Value, Captured)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(headers.get("authorization").unwrap(), "Bearer AstraCS:flow");
        seen.lock().await.push(body);
        Json(reply)
    }

    spawn(
        Router::new()
            .route("/api/v1/run/news-flow", post(run))
            .with_state((reply, seen)),
    )
    .await
}

fn flow_reply(text: &str) -> Value {
    json!({
        "session_id": "s-1",
        "outputs": [{
            "inputs": { "input_value": "hi" },
            "outputs": [{
                "outputs": { "message": { "message": { "text": text, "sender": "Machine" } } }
            }]
        }]
    })
}

#[tokio::test]
async fn turn_appends_user_then_assistant() -> Result<()> {
    let seen = captured();
    let base = flow_mock(flow_reply("Plenty is happening."), seen.clone()).await;
    let endpoint = format!("{base}/api/v1/run/news-flow");
    let mut thread = ChatThread::default();

    client()
        .send_turn(&mut thread, &endpoint, "What's new?")
        .await?;

    let turns = thread.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, ChatRole::User);
    assert_eq!(turns[0].content, "What's new?");
    assert_eq!(turns[1].role, ChatRole::Assistant);
    assert_eq!(turns[1].content, "Plenty is happening.");

    assert_eq!(
        seen.lock().await[0],
        json!({ "input_value": "What's new?", "output_type": "chat", "input_type": "chat" })
    );
    Ok(())
}

#[tokio::test]
async fn missing_reply_path_fails_without_empty_assistant_turn() {
    let base = flow_mock(json!({ "outputs": [] }), captured()).await;
    let endpoint = format!("{base}/api/v1/run/news-flow");
    let mut thread = ChatThread::default();

    let err = client()
        .send_turn(&mut thread, &endpoint, "Hello?")
        .await
        .unwrap_err();

    assert!(matches!(err, WorldwatchError::MissingResponseField(_)));
    assert_eq!(thread.len(), 1);
    assert_eq!(thread.turns()[0].role, ChatRole::User);
}

#[tokio::test]
async fn error_status_is_a_proxy_error() {
    let app = Router::new().route(
        "/api/v1/run/news-flow",
        post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "flow crashed") }),
    );
    let endpoint = format!("{}/api/v1/run/news-flow", spawn(app).await);
    let mut thread = ChatThread::default();
    assert!(matches!(
        client().send_turn(&mut thread, &endpoint, "hi").await,
        Err(WorldwatchError::ProxyError(_))
    ));
}

#[tokio::test]
async fn non_http_endpoint_is_rejected_before_sending() {
    let mut thread = ChatThread::default();
    let err = client()
        .send_turn(&mut thread, "file:///etc/passwd", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, WorldwatchError::InvalidInput(_)));
    assert!(thread.is_empty());
}
