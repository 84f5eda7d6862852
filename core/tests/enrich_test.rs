mod common;

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use common::{captured, completion, llm_client, metadata_json, spawn, Captured};
use serde_json::{json, Value};
use std::sync::Arc;
use worldwatch_core::enrich::Mood;
use worldwatch_core::{ExtractionError, MetadataEnricher, Result, WorldwatchError};

/// OpenAI mock answering every completion with `reply` as message content
async fn openai_mock(reply: String, seen: Captured) -> String {
    async fn complete(
        State((reply, seen)): State<(String, Captured)>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
        seen.lock().await.push(body);
        Json(completion(&reply))
    }

    spawn(
        Router::new()
            .route("/v1/chat/completions", post(complete))
            .with_state((reply, seen)),
    )
    .await
}

#[tokio::test]
async fn enrich_merges_metadata_with_article() -> Result<()> {
    let seen = captured();
    let base = openai_mock(metadata_json(json!(72)), seen.clone()).await;
    let enricher = MetadataEnricher::new(Arc::new(llm_client(&base)));

    let record = enricher
        .enrich("Election results", "The vote count finished in Paris")
        .await?;

    assert_eq!(record.title, "Election results");
    assert_eq!(record.content, "The vote count finished in Paris");
    assert_eq!(record.metadata.city, "Paris");
    assert_eq!(record.metadata.category, "Political");
    assert_eq!(record.metadata.sentiment.value(), 72);
    assert_eq!(record.metadata.sentiment.mood(), Mood::Positive);

    let body = &seen.lock().await[0];
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["response_format"]["type"], "json_schema");
    assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    assert_eq!(
        body["response_format"]["json_schema"]["schema"]["properties"]["sentiment"]["type"],
        "integer"
    );
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[2]["content"]
        .as_str()
        .unwrap()
        .ends_with("Title: Election results\nContent: The vote count finished in Paris"));
    Ok(())
}

#[tokio::test]
async fn numeric_string_sentiment_is_accepted() -> Result<()> {
    let base = openai_mock(metadata_json(json!("35")), captured()).await;
    let enricher = MetadataEnricher::new(Arc::new(llm_client(&base)));
    let record = enricher.enrich("t", "c").await?;
    assert_eq!(record.metadata.sentiment.value(), 35);
    assert_eq!(record.metadata.sentiment.mood(), Mood::Negative);
    Ok(())
}

#[tokio::test]
async fn sentiment_out_of_range_is_an_extraction_error() {
    let base = openai_mock(metadata_json(json!(150)), captured()).await;
    let enricher = MetadataEnricher::new(Arc::new(llm_client(&base)));
    let err = enricher.enrich("t", "c").await.unwrap_err();
    assert!(matches!(
        err,
        WorldwatchError::Extraction(ExtractionError::SentimentOutOfRange(_))
    ));
}

#[tokio::test]
async fn non_json_output_is_an_extraction_error() {
    let base = openai_mock("Sorry, I cannot help".into(), captured()).await;
    let enricher = MetadataEnricher::new(Arc::new(llm_client(&base)));
    let err = enricher.enrich("t", "c").await.unwrap_err();
    assert!(matches!(
        err,
        WorldwatchError::Extraction(ExtractionError::InvalidJson(_))
    ));
}

#[tokio::test]
async fn refusals_are_llm_errors() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": null, "refusal": "I can't do that" } }]
            }))
        }),
    );
    let enricher = MetadataEnricher::new(Arc::new(llm_client(&spawn(app).await)));
    assert!(matches!(
        enricher.enrich("t", "c").await,
        Err(WorldwatchError::LlmError(_))
    ));
}
