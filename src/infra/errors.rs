// src/infra/errors.rs — Error types for Surveyor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SurveyorError {
    // Session authority
    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Account is deactivated")]
    AccountInactive,

    // Registration / login
    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid username or password")]
    BadCredentials,

    // Ledger
    #[error("Insufficient credit: balance {balance}, required {required}")]
    InsufficientCredit { balance: i64, required: i64 },

    #[error("Unknown account '{0}'")]
    UnknownAccount(String),

    #[error("Unknown or already settled reservation '{0}'")]
    UnknownReservation(String),

    // Retrieval sources (contained by the aggregator, never surfaced to callers)
    #[error("Source '{source}' unavailable: {message}")]
    SourceUnavailable {
        source: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Answer generator
    #[error("Answer generation failed: {message}")]
    Generation { message: String, retriable: bool },

    // Payments
    #[error("Payment failed: {0}")]
    Payment(String),

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SurveyorError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SurveyorError::RateLimited { .. }
                | SurveyorError::SourceUnavailable {
                    retriable: true,
                    ..
                }
                | SurveyorError::Generation {
                    retriable: true,
                    ..
                }
        )
    }
}
