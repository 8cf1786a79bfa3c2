use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::account::{AccountRecord, AccountStatus};
use crate::errors::{AccountError, AccountResult};
use crate::linking::{self, ChatEvent, MIN_ACCOUNT_DIGITS};
use crate::server::database::Database;
use crate::server::logging::HealthResponse;
use crate::transport::Transport;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub transport: Arc<Transport>,
}

/// Standard error response body for HTTP errors.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Map internal AccountError into an HTTP response Axum understands.
///
/// This lets handlers return:
///   Result<Json<T>, AccountError>
/// and Axum will convert both success and error into HTTP responses.
impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let status = match self {
            AccountError::DateParse(_) | AccountError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AccountError::NotFound(_) => StatusCode::NOT_FOUND,
            AccountError::Network(_) | AccountError::Transport { .. } => StatusCode::BAD_GATEWAY,
            AccountError::Store(_) | AccountError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Inbound webhook payload: pre-validated chat events.
///
/// Platform signature verification and raw event parsing happen in the
/// gateway upstream; what arrives here is already flattened.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<ChatEvent>,
}

/// Response for webhook processing.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    /// Accounts linked to a recipient while processing this payload.
    pub linked: u32,
}

/// Handler for inbound chat events.
///
/// Each event is scanned for account numbers; failures on one event are
/// logged and never block the rest of the payload.
pub async fn webhook_handler(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AccountResult<Json<WebhookResponse>> {
    let mut linked = 0;

    for event in &payload.events {
        match linking::handle_chat_event(&state.db, &state.transport, event).await {
            Ok(count) => linked += count,
            Err(e) => warn!(sender = %event.sender_id, "Chat event processing failed: {e}"),
        }
    }

    Ok(Json(WebhookResponse {
        success: true,
        linked,
    }))
}

/// Request structure for creating or updating an account.
#[derive(Debug, Deserialize, Serialize)]
pub struct UpsertAccountRequest {
    pub account_number: String,
    pub license: String,
    /// Locale-formatted expiry (`DD/MM/YYYY HH:MM`, Buddhist-era year).
    pub expire_date: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Response structure for account mutations.
#[derive(Debug, Deserialize, Serialize)]
pub struct AccountResponse {
    pub success: bool,
}

/// Handler for administratively creating (or re-issuing) an account.
///
/// Accounts always start `valid`; lifecycle transitions belong to the
/// reconciliation job. The expiry cache is resolved from the raw value here;
/// an unresolvable string is accepted and reported by the next cycle.
pub async fn upsert_account_handler(
    State(state): State<AppState>,
    Json(payload): Json<UpsertAccountRequest>,
) -> AccountResult<Json<AccountResponse>> {
    if payload.account_number.len() < MIN_ACCOUNT_DIGITS
        || !payload.account_number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AccountError::InvalidRequest(format!(
            "account_number must be at least {MIN_ACCOUNT_DIGITS} digits"
        )));
    }
    if payload.license.trim().is_empty() {
        return Err(AccountError::InvalidRequest(
            "license cannot be empty".to_string(),
        ));
    }

    let now = Local::now().naive_local();
    let mut account = AccountRecord::new(
        payload.account_number.clone(),
        payload.license,
        payload.expire_date,
        now,
    );
    account.recipient_id = payload.recipient_id;

    if account.expire_date_resolved.is_none() {
        warn!(
            account = %account.account_number,
            raw = %account.expire_date_raw,
            "Stored account with unresolvable expiry date"
        );
    }

    info!(account = %payload.account_number, "Upserting account");
    state.db.upsert_account(account).await?;

    Ok(Json(AccountResponse { success: true }))
}

/// Handler for fetching one account.
pub async fn get_account_handler(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> AccountResult<Json<AccountRecord>> {
    match state.db.get_account(&account_number).await? {
        Some(account) => Ok(Json(account)),
        None => Err(AccountError::NotFound(account_number)),
    }
}

/// Query parameters for listing accounts.
#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// Response for account listings.
#[derive(Debug, Serialize)]
pub struct ListAccountsResponse {
    pub success: bool,
    pub total: usize,
    pub accounts: Vec<AccountRecord>,
}

/// Handler for listing accounts, optionally filtered by status.
pub async fn list_accounts_handler(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> AccountResult<Json<ListAccountsResponse>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(AccountStatus::parse(raw).ok_or_else(|| {
            AccountError::InvalidRequest(format!("unknown status filter '{raw}'"))
        })?),
    };

    let accounts = state.db.list_accounts(status).await?;

    Ok(Json(ListAccountsResponse {
        success: true,
        total: accounts.len(),
        accounts,
    }))
}

/// Handler for the operational inspection query: accounts whose raw expiry
/// string indicates expiry has already passed, whatever their persisted
/// status currently says.
pub async fn lapsed_accounts_handler(
    State(state): State<AppState>,
) -> AccountResult<Json<ListAccountsResponse>> {
    let now = Local::now().naive_local();
    let accounts: Vec<AccountRecord> = state
        .db
        .list_accounts(None)
        .await?
        .into_iter()
        .filter(|account| account.has_lapsed(now))
        .collect();

    Ok(Json(ListAccountsResponse {
        success: true,
        total: accounts.len(),
        accounts,
    }))
}

/// Response for account statistics.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

/// Handler for account statistics (counts per lifecycle status).
pub async fn stats_handler(
    State(state): State<AppState>,
) -> AccountResult<Json<StatsResponse>> {
    let counts = state.db.status_counts().await?;
    let total: i64 = counts.iter().map(|(_, count)| count).sum();
    let by_status = counts.into_iter().collect();

    Ok(Json(StatsResponse {
        success: true,
        total,
        by_status,
    }))
}

/// Request structure for an administrative status override.
#[derive(Debug, Deserialize, Serialize)]
pub struct SetStatusRequest {
    pub status: AccountStatus,
}

/// Handler for administratively forcing an account's status (suspension,
/// invalidation, reinstatement). The reconciliation engine never enters or
/// leaves `suspended`/`invalid` on its own; this is the lever that does.
pub async fn set_status_handler(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    Json(payload): Json<SetStatusRequest>,
) -> AccountResult<Json<AccountResponse>> {
    info!(
        account = %account_number,
        status = %payload.status,
        "Administrative status override"
    );

    if state.db.set_status(&account_number, payload.status).await? {
        Ok(Json(AccountResponse { success: true }))
    } else {
        Err(AccountError::NotFound(account_number))
    }
}

/// Handler for the health endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.db.ping().await;
    Json(HealthResponse::healthy(connected, state.db.backend_name()))
}
