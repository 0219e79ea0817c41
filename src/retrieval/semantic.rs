// src/retrieval/semantic.rs — Semantic index client (document source)
//
// The index service owns storage and ranking; this adapter only speaks its
// query API. Every query carries the requesting account id and the service
// filters on it, so one account can never see another account's documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RetrievalItem, SemanticSearchProvider, SourceKind};
use crate::infra::errors::SurveyorError;

pub struct HttpSemanticIndex {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    account_id: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryHit>,
}

#[derive(Debug, Deserialize)]
struct QueryHit {
    content: String,
    source: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    /// Vector distance; smaller is closer.
    #[serde(default)]
    distance: Option<f64>,
}

impl HttpSemanticIndex {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn unavailable(message: String, retriable: bool) -> SurveyorError {
        SurveyorError::SourceUnavailable {
            source: "document".into(),
            message,
            retriable,
        }
    }
}

#[async_trait]
impl SemanticSearchProvider for HttpSemanticIndex {
    async fn search(
        &self,
        query: &str,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalItem>, SurveyorError> {
        let url = format!("{}/v1/query", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest {
                query,
                account_id,
                limit,
            })
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(
                format!("HTTP {status}: {body}"),
                status.is_server_error(),
            ));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("Failed to parse response: {e}"), false))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|hit| RetrievalItem {
                kind: SourceKind::Document,
                content: hit.content,
                origin: hit.source,
                url: hit.url,
                title: hit.title,
                published_at: hit.published_at,
                score: hit.distance,
            })
            .collect())
    }
}
