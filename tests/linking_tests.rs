//! Integration tests for account-to-recipient linking.

#![cfg(all(feature = "background-jobs", feature = "sqlite"))]

use chrono::{NaiveDate, NaiveDateTime};

use argus::account::{AccountRecord, AccountStatus};
use argus::jobs::run_reconciliation_cycle;
use argus::linking::{handle_chat_event, ChatEvent};
use argus::server::database::Database;
use argus::transport::Transport;

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

async fn setup_test_db() -> Database {
    let db = Database::connect_sqlite("sqlite::memory:")
        .await
        .expect("failed to create database");
    db.ensure_schema().await.expect("failed to create schema");
    db
}

async fn create_account(db: &Database, account_number: &str) {
    // Expiry far in the future (Buddhist year 2599 → Gregorian 2056).
    let account = AccountRecord::new(account_number, "PRO-01", "31/12/2599 23:59", noon());
    db.upsert_account(account)
        .await
        .expect("failed to insert account");
}

fn event(sender: &str, text: &str) -> ChatEvent {
    ChatEvent {
        sender_id: sender.to_string(),
        text: text.to_string(),
        reply_token: Some("rt-1".to_string()),
    }
}

#[tokio::test]
async fn message_with_account_number_links_sender() {
    let db = setup_test_db().await;
    let transport = Transport::sim();

    create_account(&db, "123456").await;

    let linked = handle_chat_event(&db, &transport, &event("U-sender-9", "my account is 123456"))
        .await
        .expect("event handling failed");
    assert_eq!(linked, 1);

    let account = db.get_account("123456").await.unwrap().unwrap();
    assert_eq!(account.recipient_id.as_deref(), Some("U-sender-9"));

    // Confirmation reply went back on the event's reply token.
    let sim = transport.as_sim().unwrap();
    assert_eq!(sim.replied().len(), 1);
    assert_eq!(sim.replied()[0].to, "rt-1");
    assert!(sim.replied()[0].text.contains("123456"));

    // The account is still valid, so a reconciliation cycle right after
    // linking dispatches nothing.
    let stats = run_reconciliation_cycle(&db, &transport, noon(), 3)
        .await
        .expect("cycle failed");
    assert_eq!(stats.dispatched(), 0);
    assert!(sim.pushed().is_empty());

    let account = db.get_account("123456").await.unwrap().unwrap();
    assert_eq!(account.status, AccountStatus::Valid);
}

#[tokio::test]
async fn one_message_can_link_multiple_accounts() {
    let db = setup_test_db().await;
    let transport = Transport::sim();

    create_account(&db, "111111").await;
    create_account(&db, "222222").await;

    let linked = handle_chat_event(
        &db,
        &transport,
        &event("U-sender-9", "link 111111 and 222222 please"),
    )
    .await
    .expect("event handling failed");
    assert_eq!(linked, 2);

    for number in ["111111", "222222"] {
        let account = db.get_account(number).await.unwrap().unwrap();
        assert_eq!(account.recipient_id.as_deref(), Some("U-sender-9"));
    }
    assert_eq!(transport.as_sim().unwrap().replied().len(), 2);
}

#[tokio::test]
async fn short_digit_runs_and_unknown_numbers_are_ignored() {
    let db = setup_test_db().await;
    let transport = Transport::sim();

    create_account(&db, "123456").await;

    // "1234" is too short; "999999" matches no account.
    let linked = handle_chat_event(&db, &transport, &event("U-sender-9", "pin 1234, id 999999"))
        .await
        .expect("event handling failed");
    assert_eq!(linked, 0);

    let account = db.get_account("123456").await.unwrap().unwrap();
    assert!(account.recipient_id.is_none());
    assert!(transport.as_sim().unwrap().replied().is_empty());
}

#[tokio::test]
async fn relinking_reassigns_the_recipient() {
    let db = setup_test_db().await;
    let transport = Transport::sim();

    create_account(&db, "123456").await;

    handle_chat_event(&db, &transport, &event("U-first", "123456"))
        .await
        .unwrap();
    handle_chat_event(&db, &transport, &event("U-second", "123456"))
        .await
        .unwrap();

    let account = db.get_account("123456").await.unwrap().unwrap();
    assert_eq!(account.recipient_id.as_deref(), Some("U-second"));
}

#[tokio::test]
async fn reply_failure_does_not_block_linking() {
    let db = setup_test_db().await;
    let transport = Transport::sim();
    transport.as_sim().unwrap().set_failing(true);

    create_account(&db, "123456").await;

    let linked = handle_chat_event(&db, &transport, &event("U-sender-9", "123456"))
        .await
        .expect("event handling failed");

    // The link persists even though the confirmation reply failed.
    assert_eq!(linked, 1);
    let account = db.get_account("123456").await.unwrap().unwrap();
    assert_eq!(account.recipient_id.as_deref(), Some("U-sender-9"));
}
