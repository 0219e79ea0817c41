// src/api/types.rs

use serde::{Deserialize, Serialize};

use crate::session::AccountView;

/// Request body for account registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Response for register/login: the session token plus the account view.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub account: AccountView,
}

/// Response for logout.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// Response for the balance endpoint.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub balance: i64,
}

/// One row of recent ledger activity.
#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub delta: i64,
    pub action: String,
    pub detail: Option<String>,
    pub external_ref: Option<String>,
    pub timestamp: String,
}

/// Response for usage statistics.
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub account_id: String,
    pub balance: i64,
    pub reports_generated: i64,
    pub recent_activity: Vec<ActivityEntry>,
}

/// Request body for a credit purchase.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub credits: i64,
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "card".into()
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Hint for clients: a retry may succeed without any other change.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retryable: false,
        }
    }

    pub fn retryable(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            retryable: true,
        }
    }
}
