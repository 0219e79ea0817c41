// src/orchestrator/mod.rs — Request lifecycle
//
// One answered question walks validate session -> reserve credit -> gather
// evidence -> synthesize -> commit ledger entry. Retrieval can only degrade,
// never fail the request; any synthesis failure rolls the reservation back
// before it surfaces, so a caller is never charged for a report that was
// not produced.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::answer::{prompt, AnswerGenerator};
use crate::infra::config::ReportConfig;
use crate::infra::errors::SurveyorError;
use crate::ledger::{ActionKind, Ledger};
use crate::report::{citations, Report};
use crate::retrieval::aggregator::RetrievalAggregator;
use crate::retrieval::SourceFlags;
use crate::session::SessionAuthority;

/// One incoming question with its source toggles.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub sources: SourceFlags,
}

pub struct Orchestrator {
    sessions: Arc<SessionAuthority>,
    ledger: Arc<Ledger>,
    aggregator: RetrievalAggregator,
    generator: Arc<dyn AnswerGenerator>,
    report_config: ReportConfig,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionAuthority>,
        ledger: Arc<Ledger>,
        aggregator: RetrievalAggregator,
        generator: Arc<dyn AnswerGenerator>,
        report_config: ReportConfig,
    ) -> Self {
        Self {
            sessions,
            ledger,
            aggregator,
            generator,
            report_config,
        }
    }

    /// Answer one question for the bearer of `token`.
    ///
    /// Error mapping is one-to-one: InvalidToken means re-login,
    /// InsufficientCredit means buy credits, Generation is retryable at no
    /// cost. Per-source retrieval failures never surface here.
    pub async fn answer_question(
        &self,
        token: &str,
        request: QuestionRequest,
    ) -> Result<Report, SurveyorError> {
        let account = self.sessions.validate(token)?;

        let reservation = self
            .ledger
            .reserve(&account.account_id, self.ledger.query_cost())
            .await?;
        let credits_charged = reservation.amount();

        let outcome = self
            .aggregator
            .gather(&request.question, &account.account_id, &request.sources)
            .await;

        // Duplicate URLs are dropped before prompting so the generator's
        // bracketed markers line up with the citation ids.
        let items = citations::dedup_by_url(outcome.items);
        let context = prompt::build_context(&items);

        let answer = match self.generator.synthesize(&request.question, &context).await {
            Ok(answer) => answer,
            Err(e) => {
                // Rollback before surfacing, whatever the failure was.
                if let Err(rollback_err) = self.ledger.rollback(reservation).await {
                    tracing::error!(
                        account_id = %account.account_id,
                        "Rollback after generation failure also failed: {rollback_err}"
                    );
                }
                return Err(into_generation_error(e));
            }
        };

        let (citation_list, sources) =
            citations::assemble(&items, self.report_config.snippet_max_chars);

        self.ledger
            .commit(
                reservation,
                ActionKind::Query,
                &format!("research report: {}", truncate_for_log(&request.question, 80)),
            )
            .await?;

        Ok(Report {
            report_id: uuid::Uuid::new_v4().to_string(),
            question: request.question,
            answer,
            citations: citation_list,
            sources,
            source_status: outcome.status,
            credits_charged,
            generated_at: Utc::now(),
        })
    }
}

/// Normalize any synthesis-path failure to the retryable-at-no-cost kind.
fn into_generation_error(e: SurveyorError) -> SurveyorError {
    match e {
        err @ SurveyorError::Generation { .. } => err,
        SurveyorError::RateLimited { provider, .. } => SurveyorError::Generation {
            message: format!("'{provider}' rate limit held through all retries"),
            retriable: true,
        },
        other => SurveyorError::Generation {
            message: other.to_string(),
            retriable: false,
        },
    }
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
