// src/retrieval/live.rs — Live feed client
//
// Speaks to a continuously ingesting feed service; every hit carries the
// observation timestamp the feed reported.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{LiveFeedProvider, RetrievalItem, SourceKind};
use crate::infra::errors::SurveyorError;

pub struct HttpLiveFeed {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    updates: Vec<FeedUpdate>,
}

#[derive(Debug, Deserialize)]
struct FeedUpdate {
    content: String,
    source: String,
    #[serde(default)]
    url: Option<String>,
    observed_at: DateTime<Utc>,
}

impl HttpLiveFeed {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn unavailable(message: String, retriable: bool) -> SurveyorError {
        SurveyorError::SourceUnavailable {
            source: "live".into(),
            message,
            retriable,
        }
    }
}

#[async_trait]
impl LiveFeedProvider for HttpLiveFeed {
    async fn search(&self, query: &str) -> Result<Vec<RetrievalItem>, SurveyorError> {
        let url = format!("{}/v1/updates", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
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

        let parsed: FeedResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable(format!("Failed to parse response: {e}"), false))?;

        Ok(parsed
            .updates
            .into_iter()
            .map(|u| RetrievalItem {
                kind: SourceKind::Live,
                content: u.content,
                origin: u.source,
                url: u.url,
                title: None,
                published_at: Some(u.observed_at),
                score: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_maps_to_live_item() {
        let raw = r#"{
            "updates": [
                {
                    "content": "Funding round closed an hour ago",
                    "source": "Market Feed",
                    "observed_at": "2026-08-07T09:30:00Z"
                }
            ]
        }"#;
        let parsed: FeedResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.updates.len(), 1);
        assert_eq!(parsed.updates[0].source, "Market Feed");
    }

    #[test]
    fn test_empty_feed_parses() {
        let parsed: FeedResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.updates.is_empty());
    }
}
