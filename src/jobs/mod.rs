//! Background job scheduler for Argus.
//!
//! This module provides the scheduled reconciliation job that keeps account
//! lifecycle status fresh and dispatches expiry notifications.
//! Requires the `background-jobs` feature to be enabled.
//!
//! # Usage
//!
//! ```rust,ignore
//! use argus::jobs::{JobScheduler, JobConfig};
//! use argus::server::Database;
//! use argus::transport::Transport;
//!
//! let db = Database::new().await?;
//! let transport = Arc::new(Transport::line(&config.chat));
//! let scheduler = JobScheduler::new(db, transport, JobConfig::default()).await?;
//! scheduler.start().await?;
//! ```

use chrono::Local;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::{error, info, warn};

use crate::config::ReconcileConfig;
use crate::server::database::Database;
use crate::transport::Transport;

mod reconcile;

pub use reconcile::{run_reconciliation_cycle, CycleStats};

/// Configuration for background jobs.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for the reconciliation cycle (default: every 5 minutes)
    pub reconcile_cron: String,
    /// Near-expiry reminder window in days (default: 3)
    pub near_expiry_days: i64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            // Every 5 minutes
            reconcile_cron: "0 */5 * * * *".to_string(),
            near_expiry_days: 3,
        }
    }
}

impl From<&ReconcileConfig> for JobConfig {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            reconcile_cron: config.cron.clone(),
            near_expiry_days: config.near_expiry_days,
        }
    }
}

/// Background job scheduler for Argus.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    db: Arc<Database>,
    transport: Arc<Transport>,
    config: JobConfig,
    /// Held for the duration of a cycle; a tick that cannot take it skips,
    /// so two cycles never overlap on the same accounts.
    cycle_guard: Arc<Mutex<()>>,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub async fn new(
        db: Arc<Database>,
        transport: Arc<Transport>,
        config: JobConfig,
    ) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            db,
            transport,
            config,
            cycle_guard: Arc::new(Mutex::new(())),
        })
    }

    /// Start the job scheduler with the reconciliation job registered.
    pub async fn start(&self) -> Result<(), JobError> {
        info!("Starting Argus job scheduler");

        self.add_reconciliation_job().await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Argus job scheduler started successfully");

        Ok(())
    }

    /// Stop the job scheduler.
    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down Argus job scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;
        Ok(())
    }

    /// Add the reconciliation job.
    async fn add_reconciliation_job(&self) -> Result<(), JobError> {
        let db = Arc::clone(&self.db);
        let transport = Arc::clone(&self.transport);
        let guard = Arc::clone(&self.cycle_guard);
        let near_expiry_days = self.config.near_expiry_days;

        let job = Job::new_async(self.config.reconcile_cron.as_str(), move |_uuid, _l| {
            let db = Arc::clone(&db);
            let transport = Arc::clone(&transport);
            let guard = Arc::clone(&guard);

            Box::pin(async move {
                let Ok(_cycle) = guard.try_lock() else {
                    warn!("Previous reconciliation cycle still in flight, skipping this tick");
                    return;
                };

                let now = Local::now().naive_local();
                info!("Running account reconciliation cycle at {}", now);

                match run_reconciliation_cycle(&db, &transport, now, near_expiry_days).await {
                    Ok(stats) => {
                        if stats.dispatched() > 0 || stats.transitions > 0 {
                            info!(
                                "Reconciliation cycle: {} transitions, {} re-armed, \
                                 {} expired notified, {} suspended notified, {} reminded",
                                stats.transitions,
                                stats.rearmed,
                                stats.notified_expired,
                                stats.notified_suspended,
                                stats.reminded
                            );
                        }
                    }
                    Err(e) => {
                        error!("Reconciliation cycle failed: {e}");
                    }
                }
            })
        })
        .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(
            "Added account reconciliation job (schedule: {})",
            self.config.reconcile_cron
        );

        Ok(())
    }

    /// Run a reconciliation cycle immediately (useful for testing or manual
    /// triggers). Takes the same overlap guard as the scheduled job.
    pub async fn run_reconciliation_now(&self) -> Result<CycleStats, JobError> {
        let _cycle = self.cycle_guard.lock().await;
        let now = Local::now().naive_local();
        run_reconciliation_cycle(&self.db, &self.transport, now, self.config.near_expiry_days).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Cycle error: {0}")]
    CycleError(String),
}

impl From<crate::errors::AccountError> for JobError {
    fn from(err: crate::errors::AccountError) -> Self {
        JobError::StoreError(err.to_string())
    }
}
