//! Answer Synthesizer: retrieval-augmented answers streamed as they are generated

use crate::llm::{ChatMessage, DeltaStream, LlmClient};
use crate::render::render_sources;
use crate::vector::{Document, FindQuery, VectorStore};
use crate::Result;
use chrono::NaiveDate;
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

/// Documents retrieved as context for one answer
pub const ANSWER_LIMIT: usize = 10;
/// Appended to partial answers while generation is running
pub const CURSOR: &str = "▌";

const SUMMARIZER: &str =
    "You're an expert in world news and you specialize in summarizing information from the news.";
const GROUNDING: &str = "Only use the information provided in the context to answer the question. When there is no relevant information, just say so.";
const FORMATTING: &str = "When helpful, make use of captions or titles to better understand the content. Also you can make use of numbered lists to better structure the information.";

/// One rendering of the answer region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum AnswerUpdate {
    /// Text generated so far, followed by the cursor
    Partial(String),
    /// Complete answer, no cursor
    Final(String),
}

impl AnswerUpdate {
    pub fn text(&self) -> &str {
        match self {
            AnswerUpdate::Partial(t) | AnswerUpdate::Final(t) => t,
        }
    }
}

pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<AnswerUpdate>> + Send>>;

/// Sources plus the pending answer for one question
pub struct Answer {
    pub sources: Vec<Document>,
    pub updates: AnswerStream,
}

impl Answer {
    /// `#### Sources used` block for the retrieved documents
    pub fn sources_markdown(&self) -> String {
        render_sources(&self.sources)
    }
}

/// Concatenate `"{title}\n{content}\n\n"` for every document, in order
pub fn build_context(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| format!("{}\n{}\n\n", d.title, d.content))
        .collect()
}

pub fn answer_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARIZER),
        ChatMessage::system(GROUNDING),
        ChatMessage::system(FORMATTING),
        ChatMessage::user(format!("Context: {context}")),
        ChatMessage::user(format!("Question: {question}")),
    ]
}

/// Turn content deltas into cumulative renderings.
///
/// Every delta yields a `Partial` with the cursor; the end of the deltas yields
/// one `Final`. An upstream error ends the stream after being yielded.
pub fn answer_updates(deltas: DeltaStream) -> impl Stream<Item = Result<AnswerUpdate>> + Send {
    async_stream::try_stream! {
        let mut deltas = deltas;
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            text.push_str(&delta?);
            yield AnswerUpdate::Partial(format!("{text}{CURSOR}"));
        }
        debug!(target: "answer", chars = text.chars().count(), "Answer complete");
        yield AnswerUpdate::Final(text);
    }
}

pub struct AnswerSynthesizer {
    store: Arc<dyn VectorStore>,
    llm: Arc<LlmClient>,
}

impl AnswerSynthesizer {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<LlmClient>) -> Self {
        Self { store, llm }
    }

    /// Context documents for `question`, most similar first
    pub async fn retrieve(&self, question: &str, date: Option<NaiveDate>) -> Result<Vec<Document>> {
        let query = FindQuery::new(question)
            .with_date(date)
            .with_limit(ANSWER_LIMIT);
        query.validate()?;
        self.store.find(&query).await
    }

    /// Retrieve sources and start streaming the answer.
    ///
    /// The returned stream drives the upstream request; dropping it cancels
    /// generation.
    pub async fn answer(&self, question: &str, date: Option<NaiveDate>) -> Result<Answer> {
        let sources = self.retrieve(question, date).await?;
        info!(
            target: "answer",
            question = %question,
            date = ?date,
            sources = sources.len(),
            "Synthesizing answer"
        );
        let context = build_context(&sources);
        let deltas = self.llm.stream(&answer_messages(&context, question)).await?;
        Ok(Answer {
            sources,
            updates: Box::pin(answer_updates(deltas)),
        })
    }
}
