// src/server/mod.rs

//! Server-side components for Argus.
//!
//! This module contains:
//! - `database` → DB abstraction over SQLite/Postgres
//! - `handlers` → Axum HTTP handlers for the webhook and admin endpoints
//! - `routes`   → Router builder
//! - `logging`  → Request logging middleware and health payloads

pub mod database;
pub mod handlers;
pub mod logging;
pub mod routes;

// Convenient re-exports so callers can do `argus::server::X`
// instead of digging into submodules.

pub use database::Database;
pub use handlers::{
    get_account_handler, health_handler, lapsed_accounts_handler, list_accounts_handler,
    set_status_handler, stats_handler, upsert_account_handler, webhook_handler, AccountResponse,
    AppState, ListAccountsQuery, ListAccountsResponse, SetStatusRequest, StatsResponse,
    UpsertAccountRequest, WebhookPayload, WebhookResponse,
};
pub use logging::{request_logging_middleware, HealthResponse, REQUEST_ID_HEADER};
pub use routes::build_router;
