// src/retrieval/mod.rs — Retrieval sources
//
// Every source adapter returns the same tagged record, so the aggregator
// and the citation assembler are written once against a closed set of
// variants instead of per-provider result shapes.

pub mod aggregator;
pub mod live;
pub mod retry;
pub mod semantic;
pub mod web;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infra::errors::SurveyorError;

/// Which retrieval provider produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Document,
    Web,
    Live,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceKind::Document => "document",
            SourceKind::Web => "web",
            SourceKind::Live => "live",
        };
        f.write_str(s)
    }
}

/// One retrieved piece of evidence, normalized across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalItem {
    pub kind: SourceKind,
    pub content: String,
    /// Human-readable provenance label ("report.pdf", "example.com", ...).
    pub origin: String,
    pub url: Option<String>,
    pub title: Option<String>,
    /// Source-reported publication/observation time.
    pub published_at: Option<DateTime<Utc>>,
    /// Relevance or distance; only comparable within one source.
    pub score: Option<f64>,
}

/// Which source kinds a request wants queried. All on by default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SourceFlags {
    #[serde(default = "default_true")]
    pub documents: bool,
    #[serde(default = "default_true")]
    pub web: bool,
    #[serde(default = "default_true")]
    pub live: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SourceFlags {
    fn default() -> Self {
        Self {
            documents: true,
            web: true,
            live: true,
        }
    }
}

/// Per-source item count for the report's observability field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub items: usize,
}

/// Account-scoped search over the caller's own indexed documents.
#[async_trait]
pub trait SemanticSearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalItem>, SurveyorError>;
}

/// General web search.
#[async_trait]
pub trait WebSearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalItem>, SurveyorError>;
}

/// Continuously updated feed of recent observations.
#[async_trait]
pub trait LiveFeedProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<RetrievalItem>, SurveyorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Document.to_string(), "document");
        assert_eq!(SourceKind::Web.to_string(), "web");
        assert_eq!(SourceKind::Live.to_string(), "live");
    }

    #[test]
    fn test_source_flags_default_all_enabled() {
        let flags = SourceFlags::default();
        assert!(flags.documents && flags.web && flags.live);
    }

    #[test]
    fn test_source_flags_partial_json() {
        let flags: SourceFlags = serde_json::from_str(r#"{"web": false}"#).unwrap();
        assert!(flags.documents);
        assert!(!flags.web);
        assert!(flags.live);
    }
}
