//! Periodic Archive Task
//!
//! Runs the archiver on a fixed interval until a shutdown signal arrives.
//! Runs are sequential: the next tick is not awaited until the current run
//! has finished, and ticks missed during a long run are skipped.
//!
//! ```ignore
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(archive_task(archiver, ArchiveTaskConfig::default(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use coldvault_core::constants::DEFAULT_SWEEP_INTERVAL_SECS;
use coldvault_core::ColdVaultConfig;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::archiver::Archiver;
use crate::metrics::ArchiverMetrics;

/// Configuration for the periodic archive task.
#[derive(Debug, Clone)]
pub struct ArchiveTaskConfig {
    /// Time between the starts of two runs (default: 24 hours)
    pub sweep_interval: Duration,
}

impl Default for ArchiveTaskConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl From<&ColdVaultConfig> for ArchiveTaskConfig {
    fn from(config: &ColdVaultConfig) -> Self {
        Self {
            sweep_interval: config.sweep_interval,
        }
    }
}

/// Background task that archives old records once per interval.
///
/// The first run starts immediately. A failed run is logged and counted and
/// the loop carries on.
///
/// # Returns
///
/// Metrics collected during the task's lifetime
pub async fn archive_task(
    archiver: Arc<Archiver>,
    config: ArchiveTaskConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ArchiverMetrics> {
    let metrics = Arc::new(ArchiverMetrics::new());

    let mut sweep_interval = interval(config.sweep_interval);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        sweep_interval_secs = config.sweep_interval.as_secs(),
        retention_days = archiver.retention().num_days(),
        "Archive task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Archive task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                run_once(&archiver, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        records_archived = snapshot.records_archived,
        record_failures = snapshot.record_failures,
        run_failures = snapshot.run_failures,
        "Archive task completed"
    );

    metrics
}

async fn run_once(archiver: &Archiver, metrics: &ArchiverMetrics) {
    match archiver.archive_old_records().await {
        Ok(report) => metrics.record_run(&report),
        Err(e) => {
            tracing::error!(error = %e, "Archive run failed");
            metrics.record_run_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::JobContext;
    use coldvault_core::Record;
    use coldvault_storage::{
        IndexedLocator, InMemoryArchiveStore, InMemoryOperationalStore, OperationalStore,
    };

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_until_shutdown() {
        let operational = Arc::new(InMemoryOperationalStore::new());
        operational
            .upsert_record(&Record::from_keys("r1", "r1", "2001-01-01T00:00:00"))
            .await
            .unwrap();
        let archive = Arc::new(InMemoryArchiveStore::new());
        let archiver = Arc::new(Archiver::new(
            JobContext::new(operational.clone(), archive.clone(), Arc::new(IndexedLocator)),
            chrono::Duration::days(90),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = ArchiveTaskConfig {
            sweep_interval: Duration::from_secs(60),
        };
        let handle = tokio::spawn(archive_task(archiver, config, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown_tx.send(true).unwrap();
        let snapshot = handle.await.unwrap().snapshot();

        assert!(snapshot.runs >= 2, "expected repeated runs, got {}", snapshot.runs);
        assert_eq!(snapshot.records_archived, 1);
        assert_eq!(snapshot.run_failures, 0);
        assert!(operational.is_empty());
        assert_eq!(archive.paths(), vec!["2001-01-01/r1.json", "_index/r1"]);
    }

    #[test]
    fn test_config_follows_sweep_interval() {
        let config = ColdVaultConfig {
            sweep_interval: Duration::from_secs(3600),
            ..ColdVaultConfig::default()
        };
        assert_eq!(
            ArchiveTaskConfig::from(&config).sweep_interval,
            Duration::from_secs(3600)
        );
    }
}
