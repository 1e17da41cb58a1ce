use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use domain::analysis::entity::{AnalysisStatus, AnalysisTicket, SampleRef};
use domain::analysis::error::AnalysisError;
use ports::secondary::alert_store::AlertStore;
use ports::secondary::analysis_module::AnalysisModule;
use tracing::{debug, info, warn};

/// Hands locally available samples of stored alerts to the configured
/// analysis module.
pub struct AnalysisAppService {
    module: Arc<dyn AnalysisModule>,
    alert_store: Arc<dyn AlertStore>,
}

impl AnalysisAppService {
    pub fn new(module: Arc<dyn AnalysisModule>, alert_store: Arc<dyn AlertStore>) -> Self {
        Self {
            module,
            alert_store,
        }
    }

    pub fn module_name(&self) -> &str {
        self.module.name()
    }

    /// Submit the sample at `path` for the stored alert `alert_id`.
    ///
    /// The sample is tagged with the alert's rule name and content hash.
    pub async fn submit(&self, alert_id: &str, path: &Path) -> Result<AnalysisTicket, AnalysisError> {
        let alert = self
            .alert_store
            .get_alert(alert_id)
            .map_err(|e| AnalysisError::Submit(format!("alert lookup failed: {e}")))?
            .ok_or_else(|| AnalysisError::AlertNotFound(alert_id.to_string()))?;

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| AnalysisError::InvalidSample(format!("{}: {e}", path.display())))?;
        if !meta.is_file() {
            return Err(AnalysisError::InvalidSample(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let sample = SampleRef {
            path: path.to_path_buf(),
            tags: vec![alert.rule_name.clone(), alert.content_hash.clone()],
        };
        let ticket = self.module.analyze_sample(&sample).await?;
        info!(
            alert_id,
            module = %ticket.module,
            task_id = %ticket.task_id,
            "sample submitted for analysis"
        );
        Ok(ticket)
    }

    pub async fn status(&self, ticket: &AnalysisTicket) -> Result<AnalysisStatus, AnalysisError> {
        self.module.check_status(ticket).await
    }

    pub async fn cleanup(&self, ticket: &AnalysisTicket) -> Result<(), AnalysisError> {
        self.module.cleanup(ticket).await?;
        debug!(task_id = %ticket.task_id, "analysis task cleaned up");
        Ok(())
    }

    /// Poll until the task reaches a terminal status or `timeout` elapses.
    pub async fn wait_for_completion(
        &self,
        ticket: &AnalysisTicket,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<AnalysisStatus, AnalysisError> {
        let poll = async {
            loop {
                let status = self.status(ticket).await?;
                if status.is_terminal() {
                    return Ok(status);
                }
                debug!(task_id = %ticket.task_id, status = %status, "analysis still in progress");
                tokio::time::sleep(poll_interval).await;
            }
        };

        if let Ok(result) = tokio::time::timeout(timeout, poll).await {
            result
        } else {
            warn!(task_id = %ticket.task_id, "gave up waiting for analysis");
            Err(AnalysisError::Status(format!(
                "task {} not finished after {}s",
                ticket.task_id,
                timeout.as_secs()
            )))
        }
    }
}
