//! Account-to-recipient linking.
//!
//! Inbound chat messages are scanned for account numbers; every digit run
//! longer than four characters is looked up and, on an exact match, the
//! sender's chat identity becomes the account's notification recipient. One
//! message can legitimately link several accounts.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::AccountResult;
use crate::messages;
use crate::server::database::Database;
use crate::transport::Transport;

lazy_static! {
    /// Maximal digit runs in inbound text.
    static ref DIGIT_RUN: Regex = Regex::new(r"\d+").expect("digit run pattern");
}

/// Digit runs must be longer than this to be treated as account numbers.
pub const MIN_ACCOUNT_DIGITS: usize = 5;

/// A pre-validated inbound chat event.
///
/// Signature verification and raw platform event parsing happen upstream;
/// the engine only consumes this flattened form.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatEvent {
    /// Chat identity of the sender.
    pub sender_id: String,
    /// Plain text content of the message.
    pub text: String,
    /// Token for replying to this event, when the platform provided one.
    #[serde(default)]
    pub reply_token: Option<String>,
}

/// Extract candidate account numbers from message text.
pub fn extract_account_numbers(text: &str) -> Vec<String> {
    DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|run| run.len() >= MIN_ACCOUNT_DIGITS)
        .collect()
}

/// Process one inbound chat event; returns how many accounts were linked.
///
/// Lookup failures are logged and never interrupt the remaining candidate
/// numbers in the same message.
pub async fn handle_chat_event(
    db: &Database,
    transport: &Transport,
    event: &ChatEvent,
) -> AccountResult<u32> {
    let mut linked = 0;

    for number in extract_account_numbers(&event.text) {
        let account = match db.get_account(&number).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!("No account matches digit run {number}");
                continue;
            }
            Err(e) => {
                warn!("Account lookup for {number} failed: {e}");
                continue;
            }
        };

        match db
            .link_recipient(&account.account_number, &event.sender_id)
            .await
        {
            Ok(true) => {
                linked += 1;
                info!(
                    account = %account.account_number,
                    recipient = %event.sender_id,
                    "Linked account to chat recipient"
                );

                if let Some(token) = &event.reply_token {
                    let confirmation = messages::link_confirmation(&account.account_number);
                    if let Err(e) = transport.reply_message(token, &confirmation).await {
                        warn!(
                            account = %account.account_number,
                            "Link confirmation reply failed: {e}"
                        );
                    }
                }
            }
            Ok(false) => debug!(
                account = %account.account_number,
                "Account disappeared before linking"
            ),
            Err(e) => warn!(
                account = %account.account_number,
                "Failed to persist recipient link: {e}"
            ),
        }
    }

    Ok(linked)
}
