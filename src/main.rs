use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use argus::config::get_config;
use argus::jobs::{JobConfig, JobScheduler};
use argus::server::{build_router, AppState, Database};
use argus::transport::Transport;

#[tokio::main]
async fn main() {
    let config = match get_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if config.logging.enabled {
        let level = config
            .logging
            .level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO);
        tracing_subscriber::fmt().with_max_level(level).init();
    }

    info!("Starting Argus account notification server");

    let db = match Database::new().await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to the database: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = db.ensure_schema().await {
        error!("Failed to prepare the database schema: {e}");
        std::process::exit(1);
    }

    let transport = Arc::new(Transport::line(&config.chat));

    let mut scheduler = match JobScheduler::new(
        Arc::clone(&db),
        Arc::clone(&transport),
        JobConfig::from(&config.reconcile),
    )
    .await
    {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Failed to create the job scheduler: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = scheduler.start().await {
        error!("Failed to start the job scheduler: {e}");
        std::process::exit(1);
    }

    let state = AppState { db, transport };
    let app = build_router(state);

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(
                "Invalid server address {}:{}: {e}",
                config.server.host, config.server.port
            );
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("Listening on http://{addr}");
    info!("Webhook URL: http://{addr}/webhook");
    info!("Health check: http://{addr}/api/v1/health");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Err(e) = serve_result {
        error!("Server error: {e}");
    }

    if let Err(e) = scheduler.shutdown().await {
        error!("Scheduler shutdown error: {e}");
    }

    info!("Argus stopped");
}
