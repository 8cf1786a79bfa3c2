//! Outbound chat transport.
//!
//! The engine only needs "send this message to that recipient, tell me if it
//! failed". `Transport` is a unified abstraction over the real push API and
//! an in-memory simulator:
//! - `Line` → a LINE-style messaging API over HTTPS (push + reply endpoints,
//!   bearer-token auth)
//! - `Sim`  → records every message for inspection and can be switched into
//!   a failing mode; used by the integration tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use reqwest::Client;
use serde_json::json;
use tracing::error;

use crate::config::ChatConfig;
use crate::errors::{AccountError, AccountResult};
use crate::messages::TextMessage;

/// HTTP client for a LINE-style chat push API.
#[derive(Debug, Clone)]
pub struct LineClient {
    http: Client,
    api_base: String,
    access_token: String,
}

impl LineClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    /// POST a message payload; non-2xx responses surface as transport errors
    /// carrying the HTTP status and response body for diagnostics.
    async fn post_message(&self, path: &str, payload: serde_json::Value) -> AccountResult<()> {
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AccountError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat push API rejected {path}: {} {body}", status.as_u16());
            return Err(AccountError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// A message captured by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient identity (push) or reply token (reply).
    pub to: String,
    pub text: String,
}

/// In-memory transport simulator.
///
/// Push and reply traffic is recorded separately so tests can assert on
/// notification dispatch and confirmation replies independently.
#[derive(Debug, Default)]
pub struct SimTransport {
    pushed: Mutex<Vec<SentMessage>>,
    replied: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// When failing, every send returns a transport error and records
    /// nothing, mimicking a rejecting push API.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn pushed(&self) -> Vec<SentMessage> {
        self.pushed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replied(&self) -> Vec<SentMessage> {
        self.replied
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(
        &self,
        log: &Mutex<Vec<SentMessage>>,
        to: &str,
        message: &TextMessage,
    ) -> AccountResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AccountError::Transport {
                status: 500,
                body: "simulated transport failure".to_string(),
            });
        }
        log.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(SentMessage {
                to: to.to_string(),
                text: message.text.clone(),
            });
        Ok(())
    }
}

/// Unified chat transport.
#[derive(Debug)]
pub enum Transport {
    Line(LineClient),
    Sim(SimTransport),
}

impl Transport {
    /// Build the production transport from configuration.
    pub fn line(config: &ChatConfig) -> Self {
        Transport::Line(LineClient::new(config))
    }

    /// Build the in-memory simulator.
    pub fn sim() -> Self {
        Transport::Sim(SimTransport::new())
    }

    /// Access the simulator, if this transport is one.
    pub fn as_sim(&self) -> Option<&SimTransport> {
        match self {
            Transport::Sim(sim) => Some(sim),
            Transport::Line(_) => None,
        }
    }

    /// Push a message to a recipient identity.
    pub async fn push_message(&self, to: &str, message: &TextMessage) -> AccountResult<()> {
        match self {
            Transport::Line(client) => {
                client
                    .post_message(
                        "/v2/bot/message/push",
                        json!({ "to": to, "messages": [message] }),
                    )
                    .await
            }
            Transport::Sim(sim) => sim.record(&sim.pushed, to, message),
        }
    }

    /// Reply to an inbound event using its reply token.
    pub async fn reply_message(&self, reply_token: &str, message: &TextMessage) -> AccountResult<()> {
        match self {
            Transport::Line(client) => {
                client
                    .post_message(
                        "/v2/bot/message/reply",
                        json!({ "replyToken": reply_token, "messages": [message] }),
                    )
                    .await
            }
            Transport::Sim(sim) => sim.record(&sim.replied, reply_token, message),
        }
    }
}
