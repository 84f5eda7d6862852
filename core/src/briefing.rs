//! Topic briefings: date-filtered topic search, enriched and mapped

use crate::enrich::{EnrichedRecord, MetadataEnricher};
use crate::map::MapView;
use crate::render::render_result_card;
use crate::vector::{Document, FindQuery, VectorStore};
use crate::{Result, WorldwatchError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_ARTICLE_COUNT: usize = 5;

/// Suggested questions on the search tab, in display order
pub const PRESET_QUESTIONS: [&str; 5] = [
    "What's up in the world?",
    "Construct a news bulletin about positive information",
    "Where is the next big earthquake?",
    "What's the latest news on AI?",
    "Anything happening in Europe?",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicPreset {
    Political,
    Celebrities,
    Stock,
}

impl TopicPreset {
    pub const ALL: [TopicPreset; 3] = [
        TopicPreset::Political,
        TopicPreset::Celebrities,
        TopicPreset::Stock,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            TopicPreset::Political => "political",
            TopicPreset::Celebrities => "celebrities",
            TopicPreset::Stock => "stock",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TopicPreset::Political => "Politics",
            TopicPreset::Celebrities => "Celebrities",
            TopicPreset::Stock => "Stock market",
        }
    }

    /// Text the collection vectorizes to rank articles for this topic
    pub fn vectorize(self) -> &'static str {
        match self {
            TopicPreset::Political => "content that contains political information",
            TopicPreset::Celebrities => "content about celebrities",
            TopicPreset::Stock => "content that has an impact on stock prices",
        }
    }
}

impl fmt::Display for TopicPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TopicPreset {
    type Err = WorldwatchError;

    fn from_str(s: &str) -> Result<Self> {
        TopicPreset::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WorldwatchError::InvalidInput(format!("unknown topic `{s}`")))
    }
}

/// Rendered briefing for one topic and day
#[derive(Debug, Clone, Serialize)]
pub struct BriefingResult {
    pub topic: TopicPreset,
    pub date: NaiveDate,
    /// One markdown card per article, in retrieval order
    pub cards: Vec<String>,
    pub records: Vec<EnrichedRecord>,
    pub map: MapView,
}

pub struct Briefing {
    store: Arc<dyn VectorStore>,
    enricher: MetadataEnricher,
}

impl Briefing {
    pub fn new(store: Arc<dyn VectorStore>, enricher: MetadataEnricher) -> Self {
        Self { store, enricher }
    }

    pub async fn search(
        &self,
        topic: TopicPreset,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let query = FindQuery::new(topic.vectorize())
            .with_date(Some(date))
            .with_limit(limit);
        query.validate()?;
        self.store.find(&query).await
    }

    /// Search, enrich every result in order, render cards and the map.
    ///
    /// `date` defaults to today and `limit` to five articles. The first
    /// enrichment failure fails the whole briefing.
    pub async fn run(
        &self,
        topic: TopicPreset,
        date: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<BriefingResult> {
        let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
        let limit = limit.unwrap_or(DEFAULT_ARTICLE_COUNT);
        let docs = self.search(topic, date, limit).await?;

        let mut cards = Vec::with_capacity(docs.len());
        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            let record = self.enricher.enrich(&doc.title, &doc.content).await?;
            cards.push(render_result_card(doc, &record.metadata));
            records.push(record);
        }

        info!(
            target: "enrich",
            topic = %topic,
            %date,
            articles = records.len(),
            "Briefing ready"
        );
        Ok(BriefingResult {
            topic,
            date,
            cards,
            map: MapView::from_records(&records),
            records,
        })
    }
}
