use std::sync::Arc;
use std::time::Duration;

use domain::ingest::entity::IngestReport;
use domain::ingest::error::IngestError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest_pipeline::IngestPipeline;

/// Lower bound on the periodic run interval.
pub const MIN_RUN_INTERVAL: Duration = Duration::from_secs(60);

/// Serializes ingestion runs and bounds their duration.
///
/// Only one run may execute at a time within the process; a second caller
/// gets `IngestError::AlreadyRunning` instead of queueing behind the first.
pub struct IngestRunner {
    pipeline: Arc<IngestPipeline>,
    run_lock: Mutex<()>,
    run_timeout: Duration,
}

impl IngestRunner {
    pub fn new(pipeline: Arc<IngestPipeline>, run_timeout: Duration) -> Self {
        Self {
            pipeline,
            run_lock: Mutex::new(()),
            run_timeout,
        }
    }

    /// Run the pipeline once under the run lock and the run timeout.
    pub async fn trigger(&self) -> Result<IngestReport, IngestError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(IngestError::AlreadyRunning);
        };

        match tokio::time::timeout(self.run_timeout, self.pipeline.run_once()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(IngestError::Timeout(self.run_timeout)),
        }
    }

    /// Run immediately, then once per `interval` until `cancel` fires.
    ///
    /// Failed runs are logged and retried on the next tick. Ticks missed
    /// while a run is in progress are skipped rather than bunched up.
    pub async fn run_periodic(&self, interval: Duration, cancel: CancellationToken) {
        let interval = interval.max(MIN_RUN_INTERVAL);
        info!(interval_secs = interval.as_secs(), "periodic ingestion starting");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    warn!("ingestion run interrupted by shutdown");
                    break;
                }
                result = self.trigger() => {
                    if let Err(e) = result {
                        warn!(error = %e, "ingestion run failed");
                    }
                }
            }
        }

        info!("periodic ingestion stopped");
    }
}
