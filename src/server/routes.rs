use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::handlers::{
    get_account_handler, health_handler, lapsed_accounts_handler, list_accounts_handler,
    set_status_handler, stats_handler, upsert_account_handler, webhook_handler, AppState,
};
use crate::server::logging::request_logging_middleware;

/// Build the main application router for the Argus server.
///
/// This is a convenience helper so `main.rs` or tests can
/// construct the router in a single call.
///
/// # Routes
///
/// ## Chat intake
/// - `POST /webhook` - Pre-validated chat events (account linking)
///
/// ## Administrative API
/// - `GET /api/v1/health` - Service and database health
/// - `POST /api/v1/accounts` - Create or update an account
/// - `GET /api/v1/accounts` - List accounts (optional `status` query param)
/// - `GET /api/v1/accounts/stats` - Account counts per status
/// - `GET /api/v1/accounts/lapsed` - Accounts whose raw expiry has passed
/// - `GET /api/v1/accounts/{account_number}` - Get an account
/// - `POST /api/v1/accounts/{account_number}/status` - Administrative status override
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/accounts", post(upsert_account_handler))
        .route("/api/v1/accounts", get(list_accounts_handler))
        .route("/api/v1/accounts/stats", get(stats_handler))
        .route("/api/v1/accounts/lapsed", get(lapsed_accounts_handler))
        .route("/api/v1/accounts/:account_number", get(get_account_handler))
        .route(
            "/api/v1/accounts/:account_number/status",
            post(set_status_handler),
        )
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
