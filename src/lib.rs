//! Argus - account lifecycle tracking and chat expiry notifications.
//!
//! Argus watches licensed customer accounts, evaluates their lifecycle
//! status against locale-formatted (Buddhist-era) expiry dates, and pushes
//! chat notifications when a license approaches expiry, expires, or is
//! suspended — exactly-effectively-once per status transition.
//!
//! # Features
//!
//! Argus uses feature flags to allow you to include only what you need:
//!
//! - `server` - Server components (handlers, database, linking). Enabled by default.
//! - `sqlite` - SQLite database backend. Enabled by default.
//! - `postgres` - PostgreSQL database backend.
//! - `background-jobs` - Scheduled reconciliation job. Enabled by default.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + sqlite + background-jobs)
//! argus-notify = "0.3"
//!
//! # Evaluation logic only (no server, no scheduler)
//! argus-notify = { version = "0.3", default-features = false }
//!
//! # Server with PostgreSQL
//! argus-notify = { version = "0.3", features = ["server", "postgres", "background-jobs"] }
//! ```

// Core modules (always available)
pub mod account;
pub mod config;
pub mod dates;
pub mod errors;
pub mod messages;
pub mod policy;
pub mod status;
pub mod transport;

// Linking consumes the store, so it rides with the server feature.
#[cfg(feature = "server")]
pub mod linking;

// Server-related modules (requires "server" feature)
#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;

// Background reconciliation job (requires "background-jobs" feature)
#[cfg(feature = "background-jobs")]
pub mod jobs;
