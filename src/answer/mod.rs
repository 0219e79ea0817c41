// src/answer/mod.rs — Answer generator seam

pub mod gemini;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::errors::SurveyorError;
use crate::retrieval::retry::{with_backoff, BackoffConfig};

/// The synthesis collaborator: takes the question plus assembled context
/// and returns prose. Opaque to the core; failures map to
/// `SurveyorError::Generation` and the caller is never charged for them.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, SurveyorError>;
}

/// A generator wrapper that adds retry with exponential backoff.
/// Bounded attempts keep the synthesis timeout budget predictable.
pub struct RetryGenerator {
    inner: Arc<dyn AnswerGenerator>,
    config: BackoffConfig,
}

impl RetryGenerator {
    pub fn new(inner: Arc<dyn AnswerGenerator>, max_attempts: u32) -> Self {
        Self {
            inner,
            config: BackoffConfig {
                max_attempts,
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl AnswerGenerator for RetryGenerator {
    async fn synthesize(&self, question: &str, context: &str) -> Result<String, SurveyorError> {
        with_backoff(&self.config, "answer_generator", || {
            self.inner.synthesize(question, context)
        })
        .await
    }
}
