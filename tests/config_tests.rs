//! Configuration loading and validation tests.
//!
//! Tests that touch process environment variables are serialized because the
//! environment is process-global.

use std::env;

use serial_test::serial;

use argus::config::ArgusConfig;

const ARGUS_ENV_VARS: [&str; 10] = [
    "ARGUS_SERVER_HOST",
    "ARGUS_SERVER_PORT",
    "ARGUS_CHAT_ACCESS_TOKEN",
    "ARGUS_CHAT_API_BASE",
    "ARGUS_RECONCILE_CRON",
    "ARGUS_NEAR_EXPIRY_DAYS",
    "ARGUS_DATABASE_TYPE",
    "ARGUS_DATABASE_URL",
    "ARGUS_LOGGING_ENABLED",
    "ARGUS_LOG_LEVEL",
];

fn clear_env() {
    for var in ARGUS_ENV_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_are_sensible() {
    clear_env();

    let config = ArgusConfig::load().expect("load failed");
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4000);
    assert_eq!(config.chat.api_base, "https://api.line.me");
    assert_eq!(config.reconcile.cron, "0 */5 * * * *");
    assert_eq!(config.reconcile.near_expiry_days, 3);
    assert_eq!(config.database.db_type, "sqlite");
    assert_eq!(config.logging.level, "info");

    config.validate().expect("defaults must validate");
}

#[test]
#[serial]
fn environment_overrides_take_precedence() {
    clear_env();

    env::set_var("ARGUS_SERVER_PORT", "8088");
    env::set_var("ARGUS_RECONCILE_CRON", "0 */15 * * * *");
    env::set_var("ARGUS_NEAR_EXPIRY_DAYS", "7");
    env::set_var("ARGUS_CHAT_ACCESS_TOKEN", "test-token");
    env::set_var("ARGUS_DATABASE_URL", "sqlite://notify-test.db");

    let config = ArgusConfig::load().expect("load failed");
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.reconcile.cron, "0 */15 * * * *");
    assert_eq!(config.reconcile.near_expiry_days, 7);
    assert_eq!(config.chat.access_token, "test-token");
    assert_eq!(config.database.sqlite_url, "sqlite://notify-test.db");
    // A sqlite:// URL must not leak into the postgres slot.
    assert_eq!(config.database.postgres_url, "postgres://localhost/argus");

    clear_env();
}

#[test]
#[serial]
fn database_url_scheme_routes_to_the_matching_backend() {
    clear_env();

    env::set_var("ARGUS_DATABASE_TYPE", "postgres");
    env::set_var("ARGUS_DATABASE_URL", "postgres://db.internal/argus");

    let config = ArgusConfig::load().expect("load failed");
    assert_eq!(config.database.db_type, "postgres");
    assert_eq!(config.database.postgres_url, "postgres://db.internal/argus");
    assert_eq!(config.database.sqlite_url, "sqlite://argus.db");

    clear_env();
}

#[test]
fn validate_rejects_bad_values() {
    let mut config = ArgusConfig::default();
    config.database.db_type = "mongodb".to_string();
    assert!(config.validate().is_err());

    let mut config = ArgusConfig::default();
    config.logging.level = "verbose".to_string();
    assert!(config.validate().is_err());

    let mut config = ArgusConfig::default();
    config.reconcile.near_expiry_days = 0;
    assert!(config.validate().is_err());

    let mut config = ArgusConfig::default();
    config.reconcile.cron = String::new();
    assert!(config.validate().is_err());

    let mut config = ArgusConfig::default();
    config.server.port = 0;
    assert!(config.validate().is_err());
}
