// src/api/handlers.rs

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use crate::api::{auth, types::*, ApiState};
use crate::infra::errors::SurveyorError;
use crate::orchestrator::QuestionRequest;
use crate::report::Report;

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Map a domain error to its caller-visible outcome. The mapping is
/// one-to-one so clients can tell "log in again" from "buy credits"
/// from "retry for free".
fn map_error(e: SurveyorError) -> HandlerError {
    match e {
        SurveyorError::InvalidToken | SurveyorError::BadCredentials => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(e.to_string())),
        ),
        SurveyorError::AccountInactive => {
            (StatusCode::FORBIDDEN, Json(ErrorResponse::new(e.to_string())))
        }
        SurveyorError::InsufficientCredit { .. } => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ErrorResponse::new(e.to_string())),
        ),
        SurveyorError::EmailTaken | SurveyorError::UsernameTaken => {
            (StatusCode::CONFLICT, Json(ErrorResponse::new(e.to_string())))
        }
        SurveyorError::Generation { .. } => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::retryable(format!(
                "{e}. No credits were charged; the request can be retried."
            ))),
        ),
        SurveyorError::Payment(_) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(ErrorResponse::new(e.to_string())),
        ),
        other => {
            tracing::error!("Internal error: {other}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal error")),
            )
        }
    }
}

/// POST /api/v1/auth/register — Create an account and open its first session.
pub async fn register(
    State(state): State<ApiState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), HandlerError> {
    if body.username.trim().is_empty() || body.email.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Username and email are required")),
        ));
    }

    let (account, token) = state
        .sessions
        .register(body.username.trim(), body.email.trim(), &body.password)
        .map_err(map_error)?;

    Ok((StatusCode::CREATED, Json(SessionResponse { token, account })))
}

/// POST /api/v1/auth/login — Verify credentials, supersede any prior session.
pub async fn login(
    State(state): State<ApiState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, HandlerError> {
    let (account, token) = state
        .sessions
        .login(&body.username_or_email, &body.password)
        .map_err(map_error)?;

    Ok(Json(SessionResponse { token, account }))
}

/// POST /api/v1/auth/logout — Invalidate the presented session.
pub async fn logout(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, HandlerError> {
    let token = auth::bearer_token(&headers)?;
    let logged_out = state.sessions.invalidate(token).map_err(map_error)?;
    Ok(Json(LogoutResponse { logged_out }))
}

/// GET /api/v1/auth/me — The account behind the presented session.
pub async fn me(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<crate::session::AccountView>, HandlerError> {
    let token = auth::bearer_token(&headers)?;
    let account = state.sessions.validate(token).map_err(map_error)?;
    Ok(Json(account))
}

/// POST /api/v1/research — Answer a question with a cited report.
pub async fn research(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<QuestionRequest>,
) -> Result<Json<Report>, HandlerError> {
    let token = auth::bearer_token(&headers)?;

    if body.question.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Question cannot be empty")),
        ));
    }

    let report = state
        .orchestrator
        .answer_question(token, body)
        .await
        .map_err(map_error)?;
    Ok(Json(report))
}

/// GET /api/v1/balance — Current credit balance.
pub async fn balance(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, HandlerError> {
    let token = auth::bearer_token(&headers)?;
    let account = state.sessions.validate(token).map_err(map_error)?;
    let balance = state
        .ledger
        .balance(&account.account_id)
        .await
        .map_err(map_error)?;

    Ok(Json(BalanceResponse {
        account_id: account.account_id,
        balance,
    }))
}

/// GET /api/v1/usage — Report count and recent ledger activity.
pub async fn usage(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<UsageResponse>, HandlerError> {
    let token = auth::bearer_token(&headers)?;
    let account = state.sessions.validate(token).map_err(map_error)?;

    let (entries, reports_generated) = state
        .ledger
        .usage(&account.account_id, 10)
        .await
        .map_err(map_error)?;
    let balance = state
        .ledger
        .balance(&account.account_id)
        .await
        .map_err(map_error)?;

    Ok(Json(UsageResponse {
        account_id: account.account_id,
        balance,
        reports_generated,
        recent_activity: entries
            .into_iter()
            .map(|e| ActivityEntry {
                delta: e.delta,
                action: e.action,
                detail: e.detail,
                external_ref: e.external_ref,
                timestamp: e.created_at,
            })
            .collect(),
    }))
}

/// POST /api/v1/billing/purchase — Buy credits through the payment provider.
pub async fn purchase(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<PurchaseRequest>,
) -> Result<Json<crate::billing::PurchaseOutcome>, HandlerError> {
    let token = auth::bearer_token(&headers)?;
    let account = state.sessions.validate(token).map_err(map_error)?;

    if body.credits <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Credit amount must be positive")),
        ));
    }

    let outcome = state
        .billing
        .purchase_credits(&account.account_id, body.credits, &body.method)
        .await
        .map_err(map_error)?;
    Ok(Json(outcome))
}

/// GET /api/v1/health — Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
