//! Metadata Enricher: structured extraction of location, category and sentiment
//!
//! The target shape is declared once (`Metadata` plus `metadata_schema`), sent
//! to the model as a JSON-schema response format, and the reply is parsed and
//! validated back into `Metadata`. Any mismatch is an `ExtractionError`.

use crate::llm::{ChatMessage, LlmClient, ResponseSchema};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const LOCATION_EXPERT: &str = "You're an expert in location data and you specialize in understanding where things are located based on the content";
const CATEGORY_EXPERT: &str = "You also specialize in understanding what news category the content falls into, and what the sentiment of the content is.";
const EXTRACT_REQUEST: &str =
    "Extract the requested metadata from the provided content into a JSON format";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("model output does not match the metadata schema: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("sentiment `{0}` is not a number")]
    SentimentNotNumeric(String),

    #[error("sentiment {0} is outside 0..=100")]
    SentimentOutOfRange(f64),

    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
}

/// Sentiment score from 0 (negative) to 100 (positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Sentiment(u8);

impl Sentiment {
    pub fn new(value: u8) -> std::result::Result<Self, ExtractionError> {
        if value > 100 {
            return Err(ExtractionError::SentimentOutOfRange(f64::from(value)));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn mood(self) -> Mood {
        match self.0 {
            56..=100 => Mood::Positive,
            0..=44 => Mood::Negative,
            _ => Mood::Neutral,
        }
    }

    fn from_number(value: f64) -> std::result::Result<Self, ExtractionError> {
        if !value.is_finite() {
            return Err(ExtractionError::SentimentNotNumeric(value.to_string()));
        }
        let rounded = value.round();
        if !(0.0..=100.0).contains(&rounded) {
            return Err(ExtractionError::SentimentOutOfRange(value));
        }
        Ok(Self(rounded as u8))
    }
}

impl TryFrom<u8> for Sentiment {
    type Error = ExtractionError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sentiment> for u8 {
    fn from(s: Sentiment) -> Self {
        s.0
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Positive,
    Neutral,
    Negative,
}

impl Mood {
    pub fn glyph(self) -> &'static str {
        match self {
            Mood::Positive => "😊",
            Mood::Neutral => "😐",
            Mood::Negative => "😞",
        }
    }
}

/// Structured attributes extracted from an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Free-text news category, e.g. Political, Sport, Celebrities
    pub category: String,
    pub sentiment: Sentiment,
}

/// Metadata merged with the article it was extracted from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub title: String,
    pub content: String,
    #[serde(flatten)]
    pub metadata: Metadata,
}

/// JSON schema sent with every extraction request
pub fn metadata_schema() -> ResponseSchema {
    ResponseSchema {
        name: "Metadata",
        schema: json!({
            "type": "object",
            "description": "Metadata of the content",
            "properties": {
                "country": {
                    "type": "string",
                    "description": "What is the country relevant to this content"
                },
                "city": {
                    "type": "string",
                    "description": "What is the city relevant to this content"
                },
                "latitude": {
                    "type": "number",
                    "description": "What is the latitude, ideally based on the city, otherwise the country"
                },
                "longitude": {
                    "type": "number",
                    "description": "What is the longitude, ideally based on the city, otherwise the country"
                },
                "category": {
                    "type": "string",
                    "description": "What news category does this content fall into, for instance Political, Sport, Celebrities, etc"
                },
                "sentiment": {
                    "type": "integer",
                    "description": "What is the sentiment of this content, on a scale of 0 to 100, 0 being negative and 100 being positive"
                }
            },
            "required": ["country", "city", "latitude", "longitude", "category", "sentiment"],
            "additionalProperties": false
        }),
    }
}

/// Model output before validation; sentiment may come back as text
#[derive(Debug, Deserialize)]
struct RawMetadata {
    country: String,
    city: String,
    latitude: f64,
    longitude: f64,
    category: String,
    sentiment: RawSentiment,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSentiment {
    Number(f64),
    Text(String),
}

/// Parse and validate the model's JSON reply
pub fn parse_metadata(text: &str) -> std::result::Result<Metadata, ExtractionError> {
    let raw: RawMetadata = serde_json::from_str(text)?;

    let sentiment = match raw.sentiment {
        RawSentiment::Number(n) => Sentiment::from_number(n)?,
        RawSentiment::Text(s) => {
            let n: f64 = s
                .trim()
                .parse()
                .map_err(|_| ExtractionError::SentimentNotNumeric(s.clone()))?;
            Sentiment::from_number(n)?
        }
    };
    if !(-90.0..=90.0).contains(&raw.latitude) {
        return Err(ExtractionError::LatitudeOutOfRange(raw.latitude));
    }
    if !(-180.0..=180.0).contains(&raw.longitude) {
        return Err(ExtractionError::LongitudeOutOfRange(raw.longitude));
    }

    Ok(Metadata {
        country: raw.country,
        city: raw.city,
        latitude: raw.latitude,
        longitude: raw.longitude,
        category: raw.category,
        sentiment,
    })
}

/// Fixed extraction prompt for one article
pub fn extraction_messages(title: &str, content: &str) -> Vec<ChatMessage> {
    let article = format!("Title: {title}\nContent: {content}");
    vec![
        ChatMessage::system(LOCATION_EXPERT),
        ChatMessage::system(CATEGORY_EXPERT),
        ChatMessage::user(format!(
            "Only use the following content, when relevant augmented with public knowledge: {article}"
        )),
        ChatMessage::user(EXTRACT_REQUEST),
    ]
}

pub struct MetadataEnricher {
    llm: Arc<LlmClient>,
    schema: ResponseSchema,
}

impl MetadataEnricher {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self {
            llm,
            schema: metadata_schema(),
        }
    }

    /// Extract metadata for one article and merge it with the article
    pub async fn enrich(&self, title: &str, content: &str) -> Result<EnrichedRecord> {
        let messages = extraction_messages(title, content);
        let response = self.llm.complete_structured(&messages, &self.schema).await?;
        let metadata = parse_metadata(&response.text)?;
        debug!(
            target: "enrich",
            title = %title,
            country = %metadata.country,
            category = %metadata.category,
            sentiment = metadata.sentiment.value(),
            "Extracted metadata"
        );
        Ok(EnrichedRecord {
            title: title.to_string(),
            content: content.to_string(),
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(sentiment: serde_json::Value, lat: f64, lon: f64) -> String {
        json!({
            "country": "Japan",
            "city": "Tokyo",
            "latitude": lat,
            "longitude": lon,
            "category": "Science",
            "sentiment": sentiment
        })
        .to_string()
    }

    #[test]
    fn parses_numeric_and_textual_sentiment() {
        let m = parse_metadata(&reply(json!(62), 35.68, 139.69)).unwrap();
        assert_eq!(m.sentiment.value(), 62);
        let m = parse_metadata(&reply(json!(" 40 "), 35.68, 139.69)).unwrap();
        assert_eq!(m.sentiment.value(), 40);
        let m = parse_metadata(&reply(json!(49.6), 35.68, 139.69)).unwrap();
        assert_eq!(m.sentiment.value(), 50);
    }

    #[test]
    fn rejects_out_of_range_sentiment() {
        let err = parse_metadata(&reply(json!(140), 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ExtractionError::SentimentOutOfRange(_)));
        let err = parse_metadata(&reply(json!(-3), 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ExtractionError::SentimentOutOfRange(_)));
        let err = parse_metadata(&reply(json!("upbeat"), 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, ExtractionError::SentimentNotNumeric(_)));
    }

    #[test]
    fn rejects_bad_coordinates_and_shapes() {
        assert!(matches!(
            parse_metadata(&reply(json!(50), 91.0, 0.0)),
            Err(ExtractionError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            parse_metadata(&reply(json!(50), 0.0, -181.0)),
            Err(ExtractionError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            parse_metadata(r#"{"country":"X"}"#),
            Err(ExtractionError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_metadata("not json"),
            Err(ExtractionError::InvalidJson(_))
        ));
    }

    #[test]
    fn mood_thresholds() {
        assert_eq!(Sentiment::new(56).unwrap().mood(), Mood::Positive);
        assert_eq!(Sentiment::new(55).unwrap().mood(), Mood::Neutral);
        assert_eq!(Sentiment::new(45).unwrap().mood(), Mood::Neutral);
        assert_eq!(Sentiment::new(44).unwrap().mood(), Mood::Negative);
        assert!(Sentiment::new(101).is_err());
    }

    #[test]
    fn record_serializes_flat() {
        let record = EnrichedRecord {
            title: "T".into(),
            content: "C".into(),
            metadata: parse_metadata(&reply(json!(70), 1.0, 2.0)).unwrap(),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["title"], "T");
        assert_eq!(v["sentiment"], 70);
        assert_eq!(v["latitude"], 1.0);
    }

    #[test]
    fn prompt_embeds_article() {
        let msgs = extraction_messages("Quake", "A quake struck");
        assert_eq!(msgs.len(), 4);
        assert!(msgs[2].content.contains("Title: Quake\nContent: A quake struck"));
    }

    #[test]
    fn schema_is_strict() {
        let s = metadata_schema();
        assert_eq!(s.schema["additionalProperties"], false);
        assert_eq!(s.schema["required"].as_array().unwrap().len(), 6);
    }
}
