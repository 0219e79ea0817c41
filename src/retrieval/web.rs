// src/retrieval/web.rs — Web search client (SerpApi-compatible)

use async_trait::async_trait;

use super::{RetrievalItem, SourceKind, WebSearchProvider};
use crate::infra::errors::SurveyorError;

pub struct SerpApiSearch {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn unavailable(message: String, retriable: bool) -> SurveyorError {
        SurveyorError::SourceUnavailable {
            source: "web".into(),
            message,
            retriable,
        }
    }
}

#[async_trait]
impl WebSearchProvider for SerpApiSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalItem>, SurveyorError> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| Self::unavailable(format!("Bad search URL: {e}"), false))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("api_key", &self.api_key)
            .append_pair("num", &limit.to_string())
            .append_pair("engine", "google");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SurveyorError::RateLimited {
                provider: "web".into(),
                retry_after_ms: 2_000,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::unavailable(
                format!("HTTP {status}: {body}"),
                status.is_server_error(),
            ));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("Failed to parse response: {e}"), false))?;

        Ok(parse_organic_results(&data, limit))
    }
}

/// Pull `organic_results` out of a search response, preserving the
/// provider's ranking.
fn parse_organic_results(data: &serde_json::Value, limit: usize) -> Vec<RetrievalItem> {
    let Some(results) = data["organic_results"].as_array() else {
        return Vec::new();
    };

    results
        .iter()
        .take(limit)
        .map(|r| RetrievalItem {
            kind: SourceKind::Web,
            content: r["snippet"].as_str().unwrap_or_default().to_string(),
            origin: r["displayed_link"]
                .as_str()
                .or_else(|| r["link"].as_str())
                .unwrap_or("web")
                .to_string(),
            url: r["link"].as_str().map(str::to_string),
            title: r["title"].as_str().map(str::to_string),
            published_at: None,
            score: r["position"].as_f64(),
        })
        .collect()
}
