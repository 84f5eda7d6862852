// Dashboard HTTP API server
//
// Provides REST endpoints and SSE streaming for the Dashboard UI

use crate::briefing::{TopicPreset, PRESET_QUESTIONS};
use crate::chat::{validate_endpoint, ChatTurn};
use crate::dashboard::error::{map_error, ApiError};
use crate::dashboard::{static_assets, DashboardConfig, UpdateView};
use crate::stream::DrainSummary;
use crate::vector::Document;
use crate::{AnswerUpdate, Worldwatch, WorldwatchError};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        Html, IntoResponse, Sse,
    },
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Placeholder shown after the preset questions
const FREE_FORM_QUESTION: &str = "Ask your own question...";

/// Dashboard server state
#[derive(Clone)]
struct DashboardState {
    runtime: Arc<Worldwatch>,
}

/// Dashboard HTTP server
pub struct DashboardServer {
    config: DashboardConfig,
    runtime: Arc<Worldwatch>,
}

impl DashboardServer {
    pub fn new(config: DashboardConfig, runtime: Arc<Worldwatch>) -> Self {
        Self { config, runtime }
    }

    pub fn router(&self) -> Router {
        let state = DashboardState {
            runtime: Arc::clone(&self.runtime),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/static/*asset", get(static_asset_handler))
            .route("/api/health", get(health_handler))
            .route("/api/updates", get(updates_handler))
            .route("/api/updates/drain", post(drain_handler))
            .route(
                "/api/updates/subscription",
                get(subscription_handler).post(toggle_subscription_handler),
            )
            .route("/api/updates/stream", get(update_stream_handler))
            .route("/api/topics", get(topics_handler))
            .route("/api/topics/:topic", post(briefing_handler))
            .route("/api/questions", get(questions_handler))
            .route("/api/ask", post(ask_handler))
            .route("/api/chat", get(chat_handler).post(chat_turn_handler))
            .route("/api/chat/endpoint", put(chat_endpoint_handler))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(state)
    }

    /// Start the Dashboard server
    pub async fn serve(self) -> crate::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, then finish in-flight requests
    pub async fn serve_with_shutdown<F>(self, signal: F) -> crate::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr();
        info!(
            target: "dashboard",
            addr = %addr,
            "Starting Dashboard server"
        );

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(
            target: "dashboard",
            url = %format!("http://{}", addr),
            "Dashboard server ready"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        Ok(())
    }
}

/// Named SSE event with a JSON payload
fn sse_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().event(name).data(json),
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Failed to serialize SSE payload");
            Event::default().event("error").data(e.to_string())
        }
    }
}

/// Serve the main HTML page
async fn index_handler() -> Html<&'static str> {
    Html(static_assets::INDEX_HTML)
}

async fn static_asset_handler(Path(asset): Path<String>) -> impl IntoResponse {
    match static_assets::get(asset.as_str()) {
        Some(asset) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = header::HeaderValue::from_str(asset.content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (StatusCode::OK, headers, asset.body).into_response()
        }
        None => {
            let headers = HeaderMap::new();
            (StatusCode::NOT_FOUND, headers, b"Not found".as_slice()).into_response()
        }
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Current rendering of the real-time panel
async fn updates_handler(State(state): State<DashboardState>) -> Json<UpdateView> {
    Json(state.runtime.stream_reader.view().await)
}

#[derive(Debug, Serialize)]
struct DrainResponse {
    summary: DrainSummary,
    view: UpdateView,
}

/// Run one drain cycle now
async fn drain_handler(
    State(state): State<DashboardState>,
) -> Result<Json<DrainResponse>, ApiError> {
    let reader = &state.runtime.stream_reader;
    let summary = reader.drain_cycle().await?;
    Ok(Json(DrainResponse {
        summary,
        view: reader.view().await,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
struct SubscriptionStatus {
    active: bool,
}

async fn subscription_handler(State(state): State<DashboardState>) -> Json<SubscriptionStatus> {
    Json(SubscriptionStatus {
        active: state.runtime.poller.is_active(),
    })
}

/// Switch the background subscription on or off
async fn toggle_subscription_handler(
    State(state): State<DashboardState>,
    Json(req): Json<SubscriptionStatus>,
) -> Json<SubscriptionStatus> {
    let poller = &state.runtime.poller;
    let changed = if req.active {
        poller.start().await
    } else {
        poller.stop().await
    };
    info!(target: "dashboard", active = req.active, changed, "Subscription toggled");
    Json(SubscriptionStatus {
        active: poller.is_active(),
    })
}

/// SSE endpoint for the real-time panel: current view, then one per append
async fn update_stream_handler(
    State(state): State<DashboardState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.runtime.broadcaster.subscribe();
    info!(
        target: "dashboard",
        clients = state.runtime.broadcaster.subscriber_count(),
        "New SSE client connected"
    );
    let initial = state.runtime.stream_reader.view().await;
    let updates = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(view) => Some(view),
        Err(e) => {
            warn!(target: "dashboard", error = %e, "Broadcast error");
            None
        }
    });
    let stream = tokio_stream::once(initial)
        .chain(updates)
        .map(|view| Ok::<_, Infallible>(sse_event("update", &view)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Serialize)]
struct TopicInfo {
    slug: &'static str,
    label: &'static str,
    vectorize: &'static str,
}

async fn topics_handler() -> Json<Vec<TopicInfo>> {
    Json(
        TopicPreset::ALL
            .into_iter()
            .map(|t| TopicInfo {
                slug: t.slug(),
                label: t.label(),
                vectorize: t.vectorize(),
            })
            .collect(),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BriefingRequest {
    date: Option<NaiveDate>,
    limit: Option<usize>,
}

async fn briefing_handler(
    State(state): State<DashboardState>,
    Path(topic): Path<String>,
    Json(req): Json<BriefingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let topic: TopicPreset = topic.parse()?;
    let result = state
        .runtime
        .briefing()
        .run(topic, req.date, req.limit)
        .await?;
    Ok(Json(result))
}

async fn questions_handler() -> Json<Value> {
    Json(json!({
        "questions": PRESET_QUESTIONS,
        "free_form": FREE_FORM_QUESTION,
    }))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct SourcesPayload {
    markdown: String,
    documents: Vec<Document>,
}

/// SSE endpoint streaming one answer: `sources`, `partial`*, then `final`.
///
/// Failures before the first event are a JSON error response; failures while
/// generating end the stream with an `error` event.
async fn ask_handler(
    State(state): State<DashboardState>,
    Json(req): Json<AskRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err(WorldwatchError::InvalidInput("question must not be empty".into()).into());
    }

    let answer = state
        .runtime
        .answer_synthesizer()
        .answer(&question, req.date)
        .await?;
    let sources = SourcesPayload {
        markdown: answer.sources_markdown(),
        documents: answer.sources,
    };
    let mut updates = answer.updates;

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(sse_event("sources", &sources));
        while let Some(update) = updates.next().await {
            match update {
                Ok(update) => {
                    let name = match update {
                        AnswerUpdate::Partial(_) => "partial",
                        AnswerUpdate::Final(_) => "final",
                    };
                    yield Ok(sse_event(name, &update));
                }
                Err(e) => {
                    let (_, envelope) = map_error(&e);
                    warn!(target: "dashboard", error = %e, "Answer stream failed");
                    yield Ok(sse_event("error", &envelope));
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
struct ChatState {
    endpoint: Option<String>,
    turns: Vec<ChatTurn>,
}

async fn chat_state(state: &DashboardState) -> ChatState {
    let session = &state.runtime.session;
    ChatState {
        endpoint: session.flow_endpoint.read().await.clone(),
        turns: session.chat_thread.read().await.turns().to_vec(),
    }
}

async fn chat_handler(State(state): State<DashboardState>) -> Json<ChatState> {
    Json(chat_state(&state).await)
}

#[derive(Debug, Deserialize)]
struct EndpointRequest {
    endpoint: String,
}

async fn chat_endpoint_handler(
    State(state): State<DashboardState>,
    Json(req): Json<EndpointRequest>,
) -> Result<Json<ChatState>, ApiError> {
    let url = validate_endpoint(&req.endpoint)?;
    *state.runtime.session.flow_endpoint.write().await = Some(url.to_string());
    info!(target: "dashboard", endpoint = %url, "Flow endpoint set");
    Ok(Json(chat_state(&state).await))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

/// Proxy one user turn and return the whole thread
async fn chat_turn_handler(
    State(state): State<DashboardState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatState>, ApiError> {
    let endpoint = state
        .runtime
        .session
        .flow_endpoint
        .read()
        .await
        .clone()
        .ok_or_else(|| {
            WorldwatchError::InvalidInput(
                "chat is disabled until a flow endpoint is set".into(),
            )
        })?;

    // The lock is not held across the flow call
    let session = &state.runtime.session;
    let mut draft = session.chat_thread.read().await.clone();
    let before = draft.len();
    let sent = state
        .runtime
        .flow_client
        .send_turn(&mut draft, &endpoint, &req.message)
        .await;
    session
        .chat_thread
        .write()
        .await
        .extend_from(draft.since(before));
    sent?;
    Ok(Json(chat_state(&state).await))
}
