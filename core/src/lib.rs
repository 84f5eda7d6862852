// Worldwatch Core Library
// Live news dashboard runtime: stream reader, semantic search, LLM enrichment

pub mod answer;
pub mod briefing;
pub mod chat;
pub mod dashboard;
pub mod enrich;
pub mod event;
pub mod llm;
pub mod map;
pub mod render;
pub mod stream;
pub mod vector;

// Export core types
pub use answer::{Answer, AnswerSynthesizer, AnswerUpdate};
pub use briefing::{Briefing, BriefingResult, TopicPreset};
pub use chat::{ChatRole, ChatThread, ChatTurn, FlowClient, FlowClientConfig};
pub use enrich::{EnrichedRecord, ExtractionError, Metadata, MetadataEnricher, Sentiment};
pub use event::{Event, EventLog, StreamPayload};
pub use llm::{LlmClient, LlmClientConfig};
pub use map::{MapMarker, MapView};
pub use stream::{DrainSummary, MessageConsumer, QueueMessage, StreamReader};
pub use vector::{Document, FindQuery, VectorStore};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use dashboard::UpdateBroadcaster;
use stream::Poller;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),

    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Chat proxy error: {0}")]
    ProxyError(String),

    #[error("Flow response is missing `{0}`")]
    MissingResponseField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, WorldwatchError>;

/// Session-scoped state shared by every dashboard interaction
pub struct Session {
    pub chat_thread: RwLock<ChatThread>,
    pub flow_endpoint: RwLock<Option<String>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            chat_thread: RwLock::new(ChatThread::default()),
            flow_endpoint: RwLock::new(None),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing knobs for the stream side of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Pause between background drain cycles
    pub poll_interval: Duration,
    /// Wait for a single receive before a drain cycle ends
    pub receive_timeout: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            receive_timeout: stream::DEFAULT_RECEIVE_TIMEOUT,
        }
    }
}

/// Core runtime
///
/// Owns the service handles for the lifetime of the process. Every handle is
/// constructed by the caller and injected here; `shutdown` releases them.
pub struct Worldwatch {
    pub stream_reader: Arc<StreamReader>,
    pub poller: Poller,
    pub vector_store: Arc<dyn VectorStore>,
    pub llm: Arc<LlmClient>,
    pub flow_client: Arc<FlowClient>,
    pub broadcaster: UpdateBroadcaster,
    pub session: Arc<Session>,
}

impl Worldwatch {
    pub fn new(
        consumer: Box<dyn MessageConsumer>,
        vector_store: Arc<dyn VectorStore>,
        llm: LlmClient,
        flow_client: FlowClient,
        options: RuntimeOptions,
    ) -> Self {
        let broadcaster = UpdateBroadcaster::default();
        let stream_reader = Arc::new(
            StreamReader::new(consumer)
                .with_receive_timeout(options.receive_timeout)
                .with_broadcaster(broadcaster.clone()),
        );
        let poller = Poller::new(Arc::clone(&stream_reader), options.poll_interval);
        Self {
            stream_reader,
            poller,
            vector_store,
            llm: Arc::new(llm),
            flow_client: Arc::new(flow_client),
            broadcaster,
            session: Arc::new(Session::new()),
        }
    }

    pub fn enricher(&self) -> MetadataEnricher {
        MetadataEnricher::new(Arc::clone(&self.llm))
    }

    pub fn answer_synthesizer(&self) -> AnswerSynthesizer {
        AnswerSynthesizer::new(Arc::clone(&self.vector_store), Arc::clone(&self.llm))
    }

    pub fn briefing(&self) -> Briefing {
        Briefing::new(Arc::clone(&self.vector_store), self.enricher())
    }

    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down Worldwatch...");

        self.poller.stop().await;
        self.stream_reader.close().await?;

        tracing::info!("Worldwatch shut down successfully");
        Ok(())
    }
}
