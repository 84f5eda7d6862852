use super::{Document, FindQuery, VectorStore};
use crate::{Result, WorldwatchError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for AstraCollection loaded from environment variables
#[derive(Debug, Clone)]
pub struct AstraConfig {
    pub api_endpoint: String, // e.g., https://<db-id>-<region>.apps.astra.datastax.com
    pub token: String,
    pub keyspace: String,
    pub collection: String,
    pub request_timeout_ms: u64,
}

impl Default for AstraConfig {
    fn default() -> Self {
        Self {
            api_endpoint: std::env::var("ASTRA_DB_API_ENDPOINT").unwrap_or_default(),
            token: std::env::var("ASTRA_DB_APPLICATION_TOKEN").unwrap_or_default(),
            keyspace: std::env::var("ASTRA_KEYSPACE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "default_keyspace".to_string()),
            collection: std::env::var("ASTRA_COLLECTION").unwrap_or_default(),
            request_timeout_ms: std::env::var("ASTRA_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

/// Handle on one collection of the Astra Data API
#[derive(Clone)]
pub struct AstraCollection {
    http: Client,
    cfg: AstraConfig,
}

impl AstraCollection {
    pub fn new(cfg: AstraConfig) -> Result<Self> {
        if cfg.api_endpoint.is_empty() || cfg.collection.is_empty() {
            return Err(WorldwatchError::ConfigError(
                "Astra endpoint and collection are required".into(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| {
                WorldwatchError::VectorStoreError(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AstraConfig::default())
    }

    pub fn collection_url(&self) -> String {
        format!(
            "{}/api/json/v1/{}/{}",
            self.cfg.api_endpoint.trim_end_matches('/'),
            self.cfg.keyspace,
            self.cfg.collection
        )
    }
}

/// Data API `find` command for a query
pub fn find_command(query: &FindQuery) -> Value {
    let mut filter = Map::new();
    if let Some(date) = query.date {
        filter.insert("metadata.date".into(), Value::String(date.to_string()));
    }
    let projection: Map<String, Value> = query
        .projection
        .iter()
        .map(|field| (field.clone(), json!(1)))
        .collect();

    json!({
        "find": {
            "filter": filter,
            "sort": { "$vectorize": query.vectorize },
            "projection": projection,
            "options": {
                "limit": query.limit,
                "includeSimilarity": query.include_similarity,
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    data: Option<FindData>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct FindData {
    #[serde(default)]
    documents: Vec<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "_id")]
    id: Option<Value>,
    #[serde(default)]
    content: String,
    metadata: RawMetadata,
    #[serde(rename = "$similarity", default)]
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    title: String,
    source: String,
    date: Option<String>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        let id = raw.id.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        });
        Document {
            id,
            title: raw.metadata.title,
            source: raw.metadata.source,
            date: raw.metadata.date,
            content: raw.content,
            similarity: raw.similarity,
        }
    }
}

#[async_trait]
impl VectorStore for AstraCollection {
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>> {
        query.validate()?;
        let url = self.collection_url();
        debug!(
            target: "vector",
            collection = %self.cfg.collection,
            date = ?query.date,
            limit = query.limit,
            "POST find"
        );

        let resp = self
            .http
            .post(&url)
            .header("Token", &self.cfg.token)
            .json(&find_command(query))
            .send()
            .await
            .map_err(|e| WorldwatchError::VectorStoreError(format!("Find request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!(target: "vector", %status, body = %body, "Find returned an error status");
            return Err(WorldwatchError::VectorStoreError(format!(
                "Find failed: status={status} body={body}"
            )));
        }

        let parsed: FindResponse = resp.json().await.map_err(|e| {
            WorldwatchError::VectorStoreError(format!("Failed to parse find response: {e}"))
        })?;
        if let Some(err) = parsed.errors.first() {
            return Err(WorldwatchError::VectorStoreError(format!(
                "{} ({})",
                err.message,
                err.error_code.as_deref().unwrap_or("UNKNOWN")
            )));
        }

        let docs: Vec<Document> = parsed
            .data
            .map(|d| d.documents)
            .unwrap_or_default()
            .into_iter()
            .take(query.limit)
            .map(Document::from)
            .collect();
        debug!(target: "vector", returned = docs.len(), "Find complete");
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn command_includes_date_filter_when_set() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let cmd = find_command(
            &FindQuery::new("content about celebrities")
                .with_date(Some(date))
                .with_limit(5),
        );
        assert_eq!(cmd["find"]["filter"]["metadata.date"], "2024-01-01");
        assert_eq!(cmd["find"]["sort"]["$vectorize"], "content about celebrities");
        assert_eq!(cmd["find"]["options"]["limit"], 5);
        assert_eq!(cmd["find"]["options"]["includeSimilarity"], true);
        assert_eq!(cmd["find"]["projection"]["metadata.title"], 1);
    }

    #[test]
    fn command_has_empty_filter_without_date() {
        let cmd = find_command(&FindQuery::new("x"));
        assert_eq!(cmd["find"]["filter"], json!({}));
    }

    #[test]
    fn raw_document_converts() {
        let raw: RawDocument = serde_json::from_value(json!({
            "_id": "abc",
            "content": "body",
            "metadata": { "title": "T", "source": "https://s" },
            "$similarity": 0.75
        }))
        .unwrap();
        let doc = Document::from(raw);
        assert_eq!(doc.id.as_deref(), Some("abc"));
        assert_eq!(doc.date, None);
        assert_eq!(doc.similarity, 0.75);
    }

    #[test]
    fn new_requires_endpoint_and_collection() {
        let cfg = AstraConfig {
            api_endpoint: String::new(),
            token: "t".into(),
            keyspace: "default_keyspace".into(),
            collection: "news".into(),
            request_timeout_ms: 1000,
        };
        assert!(AstraCollection::new(cfg).is_err());
    }
}
