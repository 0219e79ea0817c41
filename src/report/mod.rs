// src/report/mod.rs — The cited research report

pub mod citations;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use citations::Citation;

use crate::retrieval::SourceStatus;

/// The finished product of one answered question. Transient: owned by the
/// request that produced it and discarded after the response is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Deduplicated origin labels of everything cited.
    pub sources: Vec<String>,
    /// Item count per enabled source; zero entries flag degraded retrieval.
    pub source_status: Vec<SourceStatus>,
    pub credits_charged: i64,
    pub generated_at: DateTime<Utc>,
}
