// src/retrieval/aggregator.rs — Concurrent fan-out across retrieval sources
//
// Each enabled adapter runs concurrently under its own timeout. A source
// that errors or times out contributes zero items and never fails the
// aggregation; one flaky provider must not block report generation.
// Results concatenate in fixed precedence order (document, web, live) and
// the total cap keeps earlier-precedence items when truncating.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::{
    LiveFeedProvider, RetrievalItem, SemanticSearchProvider, SourceFlags, SourceKind,
    SourceStatus, WebSearchProvider,
};
use crate::infra::config::RetrievalConfig;
use crate::infra::errors::SurveyorError;

/// The flat, capped result of one fan-out.
#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub items: Vec<RetrievalItem>,
    /// One entry per enabled source, including those that returned nothing.
    pub status: Vec<SourceStatus>,
}

pub struct RetrievalAggregator {
    documents: Arc<dyn SemanticSearchProvider>,
    web: Arc<dyn WebSearchProvider>,
    live: Arc<dyn LiveFeedProvider>,
    config: RetrievalConfig,
}

impl RetrievalAggregator {
    pub fn new(
        documents: Arc<dyn SemanticSearchProvider>,
        web: Arc<dyn WebSearchProvider>,
        live: Arc<dyn LiveFeedProvider>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            documents,
            web,
            live,
            config,
        }
    }

    /// Fan the query out to every enabled source. Infallible by contract:
    /// per-source failures degrade to empty result sets.
    pub async fn gather(
        &self,
        query: &str,
        account_id: &str,
        flags: &SourceFlags,
    ) -> AggregateOutcome {
        let per_source = Duration::from_millis(self.config.per_source_timeout_ms);
        let limit = self.config.per_source_limit;

        let documents = async {
            if !flags.documents {
                return None;
            }
            Some(
                bounded(
                    SourceKind::Document,
                    per_source,
                    self.documents.search(query, account_id, limit),
                )
                .await,
            )
        };
        let web = async {
            if !flags.web {
                return None;
            }
            Some(bounded(SourceKind::Web, per_source, self.web.search(query, limit)).await)
        };
        let live = async {
            if !flags.live {
                return None;
            }
            Some(bounded(SourceKind::Live, per_source, self.live.search(query)).await)
        };

        let (documents, web, live) = tokio::join!(documents, web, live);

        let mut items = Vec::new();
        let mut status = Vec::new();
        for source in [documents, web, live].into_iter().flatten() {
            status.push(SourceStatus {
                kind: source.0,
                items: source.1.len(),
            });
            items.extend(source.1);
        }

        if items.len() > self.config.max_items {
            items.truncate(self.config.max_items);
        }

        AggregateOutcome { items, status }
    }
}

/// Run one adapter call under its timeout, swallowing failures.
async fn bounded(
    kind: SourceKind,
    limit: Duration,
    call: impl std::future::Future<Output = Result<Vec<RetrievalItem>, SurveyorError>>,
) -> (SourceKind, Vec<RetrievalItem>) {
    match timeout(limit, call).await {
        Ok(Ok(items)) => (kind, items),
        Ok(Err(e)) => {
            tracing::warn!(source = %kind, "Source failed, continuing without it: {e}");
            (kind, Vec::new())
        }
        Err(_) => {
            tracing::warn!(
                source = %kind,
                timeout_ms = limit.as_millis() as u64,
                "Source timed out, continuing without it"
            );
            (kind, Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn item(kind: SourceKind, origin: &str) -> RetrievalItem {
        RetrievalItem {
            kind,
            content: format!("content from {origin}"),
            origin: origin.to_string(),
            url: None,
            title: None,
            published_at: None,
            score: None,
        }
    }

    /// Adapter double: yields a fixed item count, or errors, or hangs.
    enum Behavior {
        Items(usize),
        Fail,
        Hang,
    }

    struct FakeSource {
        kind: SourceKind,
        behavior: Behavior,
    }

    impl FakeSource {
        async fn produce(&self) -> Result<Vec<RetrievalItem>, SurveyorError> {
            match self.behavior {
                Behavior::Items(n) => Ok((0..n)
                    .map(|i| item(self.kind, &format!("{}-{i}", self.kind)))
                    .collect()),
                Behavior::Fail => Err(SurveyorError::SourceUnavailable {
                    source: self.kind.to_string(),
                    message: "HTTP 503".into(),
                    retriable: true,
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[async_trait]
    impl SemanticSearchProvider for FakeSource {
        async fn search(
            &self,
            _query: &str,
            _account_id: &str,
            _limit: usize,
        ) -> Result<Vec<RetrievalItem>, SurveyorError> {
            self.produce().await
        }
    }

    #[async_trait]
    impl WebSearchProvider for FakeSource {
        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<RetrievalItem>, SurveyorError> {
            self.produce().await
        }
    }

    #[async_trait]
    impl LiveFeedProvider for FakeSource {
        async fn search(&self, _query: &str) -> Result<Vec<RetrievalItem>, SurveyorError> {
            self.produce().await
        }
    }

    fn aggregator(
        documents: Behavior,
        web: Behavior,
        live: Behavior,
        config: RetrievalConfig,
    ) -> RetrievalAggregator {
        RetrievalAggregator::new(
            Arc::new(FakeSource {
                kind: SourceKind::Document,
                behavior: documents,
            }),
            Arc::new(FakeSource {
                kind: SourceKind::Web,
                behavior: web,
            }),
            Arc::new(FakeSource {
                kind: SourceKind::Live,
                behavior: live,
            }),
            config,
        )
    }

    fn fast_config() -> RetrievalConfig {
        RetrievalConfig {
            per_source_timeout_ms: 50,
            per_source_limit: 5,
            max_items: 10,
        }
    }

    #[tokio::test]
    async fn test_results_concatenate_in_precedence_order() {
        let agg = aggregator(
            Behavior::Items(2),
            Behavior::Items(2),
            Behavior::Items(2),
            fast_config(),
        );
        let outcome = agg.gather("q", "acct-1", &SourceFlags::default()).await;

        let kinds: Vec<SourceKind> = outcome.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Document,
                SourceKind::Document,
                SourceKind::Web,
                SourceKind::Web,
                SourceKind::Live,
                SourceKind::Live
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_source_contributes_nothing() {
        let agg = aggregator(
            Behavior::Items(2),
            Behavior::Fail,
            Behavior::Items(1),
            fast_config(),
        );
        let outcome = agg.gather("q", "acct-1", &SourceFlags::default()).await;

        assert_eq!(outcome.items.len(), 3);
        let web_status = outcome
            .status
            .iter()
            .find(|s| s.kind == SourceKind::Web)
            .unwrap();
        assert_eq!(web_status.items, 0);
    }

    #[tokio::test]
    async fn test_hanging_source_is_cut_off_at_timeout() {
        let agg = aggregator(
            Behavior::Items(1),
            Behavior::Hang,
            Behavior::Items(1),
            fast_config(),
        );
        let started = std::time::Instant::now();
        let outcome = agg.gather("q", "acct-1", &SourceFlags::default()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.items.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_sources_are_not_queried_or_reported() {
        let agg = aggregator(
            Behavior::Items(2),
            Behavior::Items(2),
            Behavior::Items(2),
            fast_config(),
        );
        let flags = SourceFlags {
            documents: true,
            web: false,
            live: false,
        };
        let outcome = agg.gather("q", "acct-1", &flags).await;

        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.status.len(), 1);
        assert_eq!(outcome.status[0].kind, SourceKind::Document);
    }

    #[tokio::test]
    async fn test_cap_keeps_earlier_precedence_items() {
        let config = RetrievalConfig {
            per_source_timeout_ms: 50,
            per_source_limit: 5,
            max_items: 4,
        };
        let agg = aggregator(
            Behavior::Items(3),
            Behavior::Items(3),
            Behavior::Items(3),
            config,
        );
        let outcome = agg.gather("q", "acct-1", &SourceFlags::default()).await;

        assert_eq!(outcome.items.len(), 4);
        let kinds: Vec<SourceKind> = outcome.items.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Document,
                SourceKind::Document,
                SourceKind::Document,
                SourceKind::Web
            ]
        );
        // Status still reports what each source returned before the cap.
        assert!(outcome.status.iter().all(|s| s.items == 3));
    }

    #[tokio::test]
    async fn test_all_sources_failing_degrades_to_empty() {
        let agg = aggregator(Behavior::Fail, Behavior::Fail, Behavior::Fail, fast_config());
        let outcome = agg.gather("q", "acct-1", &SourceFlags::default()).await;

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.status.len(), 3);
        assert!(outcome.status.iter().all(|s| s.items == 0));
    }
}
