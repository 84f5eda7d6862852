//! Semantic Query Client: similarity-ranked lookups against a vector collection
//!
//! This module provides:
//! - `FindQuery` describing a filtered `$vectorize` lookup
//! - `Document` as returned by the collection, with its similarity score
//! - `VectorStore` trait, implemented by `AstraCollection` for the Astra Data API

mod astra;

pub use astra::{AstraCollection, AstraConfig};

use crate::{Result, WorldwatchError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fields requested from the collection unless a query asks otherwise
pub const DEFAULT_PROJECTION: [&str; 4] = [
    "content",
    "metadata.title",
    "metadata.source",
    "metadata.date",
];

/// Largest result set a vector-sorted find may ask for
pub const MAX_LIMIT: usize = 1000;

/// Filtered, similarity-ranked lookup
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    /// Exact match on `metadata.date`
    pub date: Option<NaiveDate>,
    /// Natural-language text the collection vectorizes and sorts by
    pub vectorize: String,
    pub limit: usize,
    pub projection: Vec<String>,
    pub include_similarity: bool,
}

impl FindQuery {
    pub fn new(vectorize: impl Into<String>) -> Self {
        Self {
            date: None,
            vectorize: vectorize.into(),
            limit: 10,
            projection: DEFAULT_PROJECTION.iter().map(|s| s.to_string()).collect(),
            include_similarity: true,
        }
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_projection(mut self, fields: &[&str]) -> Self {
        self.projection = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.vectorize.trim().is_empty() {
            return Err(WorldwatchError::InvalidInput(
                "query text must not be empty".into(),
            ));
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(WorldwatchError::InvalidInput(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

/// A scored article from the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Option<String>,
    pub title: String,
    pub source: String,
    pub date: Option<String>,
    pub content: String,
    /// Similarity to the query in `[0, 1]`
    pub similarity: f64,
}

/// Collection supporting filtered vector-sorted finds
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `query.limit` documents, most similar first, in the order the index returns them
    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>>;
}
