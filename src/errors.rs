//! Error types shared across the Argus engine.
//!
//! The taxonomy separates failures by how the reconciliation cycle reacts to
//! them:
//! - `DateParse` → the account's status evaluation is left unchanged
//! - `Store` → that account is skipped for the current cycle
//! - `Network` / `Transport` → bookkeeping is skipped, the account is retried
//!   on the next cycle
//! - `NotFound` / `Config` → surfaced to the caller (HTTP 404 / startup)

use thiserror::Error;

/// Errors produced by the account lifecycle and notification engine.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The expiry string could not be parsed into a calendar instant.
    #[error("unparsable expiry date: {0}")]
    DateParse(String),

    /// The persistent store failed or was unavailable.
    #[error("store error: {0}")]
    Store(String),

    /// The outbound chat request never reached the push API.
    #[error("chat network error: {0}")]
    Network(String),

    /// The chat push API rejected the request.
    #[error("chat push rejected (status {status}): {body}")]
    Transport { status: u16, body: String },

    /// No account matches the requested identifier.
    #[error("account not found: {0}")]
    NotFound(String),

    /// A request payload failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AccountError {
    /// True for failures of the outbound chat transport, which are always
    /// retried on a later cycle rather than escalated.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AccountError::Network(_) | AccountError::Transport { .. }
        )
    }
}

/// Result type for engine operations.
pub type AccountResult<T> = Result<T, AccountError>;
