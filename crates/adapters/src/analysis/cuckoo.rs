use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use domain::analysis::entity::{AnalysisStatus, AnalysisTicket, AnalyzerSettings, SampleRef};
use domain::analysis::error::AnalysisError;
use ports::secondary::analysis_module::AnalysisModule;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::intel::{build_client, read_capped_body, redact};

pub const MODULE_NAME: &str = "cuckoo";

const MAX_API_RESPONSE_SIZE: usize = 1024 * 1024;

/// Cuckoo Sandbox REST API client.
pub struct CuckooAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_token: Option<String>,
}

/// Registry factory.
pub fn build(settings: &AnalyzerSettings) -> Result<Arc<dyn AnalysisModule>, AnalysisError> {
    let analyzer = CuckooAnalyzer::new(
        &settings.endpoint,
        settings.api_token.clone(),
        Duration::from_secs(settings.timeout_secs),
    )?;
    Ok(Arc::new(analyzer))
}

impl CuckooAnalyzer {
    pub fn new(
        endpoint: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = build_client(timeout)
            .map_err(|e| AnalysisError::Submit(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{path}", self.endpoint));
        match self.api_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, String> {
        let body = read_capped_body(response, MAX_API_RESPONSE_SIZE)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_slice(&body).map_err(|e| format!("invalid JSON: {e}"))
    }

    async fn do_submit(&self, sample: &SampleRef) -> Result<AnalysisTicket, AnalysisError> {
        let bytes = tokio::fs::read(&sample.path).await.map_err(|e| {
            AnalysisError::InvalidSample(format!("{}: {e}", sample.path.display()))
        })?;
        let file_name = sample
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sample")
            .to_string();

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("tags", sample.tags.join(","));

        let response = self
            .request(reqwest::Method::POST, "/tasks/create/file")
            .multipart(form)
            .send()
            .await
            .map_err(|e| AnalysisError::Submit(redact(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Submit(format!("sandbox returned HTTP {status}")));
        }

        let body = Self::read_json(response).await.map_err(AnalysisError::Submit)?;
        let task_id = match body.get("task_id") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => {
                return Err(AnalysisError::Submit(
                    "response carries no 'task_id'".to_string(),
                ));
            }
        };

        Ok(AnalysisTicket {
            module: MODULE_NAME.to_string(),
            task_id,
        })
    }

    async fn do_check_status(&self, ticket: &AnalysisTicket) -> Result<AnalysisStatus, AnalysisError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/tasks/view/{}", ticket.task_id))
            .send()
            .await
            .map_err(|e| AnalysisError::Status(redact(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Status(format!(
                "task {} lookup returned HTTP {status}",
                ticket.task_id
            )));
        }

        let body = Self::read_json(response).await.map_err(AnalysisError::Status)?;
        let raw = body
            .get("task")
            .and_then(|t| t.get("status"))
            .and_then(Value::as_str)
            .ok_or_else(|| AnalysisError::Status("response carries no 'task.status'".to_string()))?;

        map_status(raw)
            .ok_or_else(|| AnalysisError::Status(format!("unrecognised task status '{raw}'")))
    }

    async fn do_cleanup(&self, ticket: &AnalysisTicket) -> Result<(), AnalysisError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/tasks/delete/{}", ticket.task_id))
            .send()
            .await
            .map_err(|e| AnalysisError::Cleanup(redact(e)))?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!(task_id = %ticket.task_id, "sandbox task already gone");
                Ok(())
            }
            s => Err(AnalysisError::Cleanup(format!(
                "task {} delete returned HTTP {s}",
                ticket.task_id
            ))),
        }
    }
}

fn map_status(raw: &str) -> Option<AnalysisStatus> {
    match raw {
        "pending" => Some(AnalysisStatus::Pending),
        "running" | "recovered" => Some(AnalysisStatus::Running),
        "completed" | "reported" => Some(AnalysisStatus::Completed),
        s if s.starts_with("failed") => Some(AnalysisStatus::Failed),
        _ => None,
    }
}

impl AnalysisModule for CuckooAnalyzer {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    fn analyze_sample<'a>(
        &'a self,
        sample: &'a SampleRef,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisTicket, AnalysisError>> + Send + 'a>> {
        Box::pin(self.do_submit(sample))
    }

    fn check_status<'a>(
        &'a self,
        ticket: &'a AnalysisTicket,
    ) -> Pin<Box<dyn Future<Output = Result<AnalysisStatus, AnalysisError>> + Send + 'a>> {
        Box::pin(self.do_check_status(ticket))
    }

    fn cleanup<'a>(
        &'a self,
        ticket: &'a AnalysisTicket,
    ) -> Pin<Box<dyn Future<Output = Result<(), AnalysisError>> + Send + 'a>> {
        Box::pin(self.do_cleanup(ticket))
    }
}
