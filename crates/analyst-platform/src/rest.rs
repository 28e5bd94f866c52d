//! REST client for the plain request/response endpoints.
//!
//! Uses browser `fetch()` via gloo-net. Every endpoint is a JSON POST under
//! the configured api prefix.

use async_trait::async_trait;
use gloo_net::http::{Request, Response};
use serde_json::{Value, json};

use analyst_core::ports::{ReportFormat, RestPort};
use analyst_types::{AnalystError, Result, analysis::AnalysisViewModel, config::BackendConfig};

pub struct HttpRestClient {
    backend: BackendConfig,
}

impl HttpRestClient {
    pub fn new(backend: BackendConfig) -> Self {
        Self { backend }
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Response> {
        let url = self.backend.endpoint(endpoint);
        log::debug!("POST {}", url);

        let response = Request::post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .map_err(|e| AnalystError::Network(e.to_string()))?
            .send()
            .await
            .map_err(|e| AnalystError::Network(e.to_string()))?;

        if !response.ok() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            log::warn!("{} returned HTTP {}", endpoint, status);
            return Err(AnalystError::Network(format!(
                "HTTP {}: {}",
                status,
                detail_message(&text)
            )));
        }
        Ok(response)
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.post(endpoint, body)
            .await?
            .json()
            .await
            .map_err(|e| AnalystError::Protocol(e.to_string()))
    }
}

#[async_trait(?Send)]
impl RestPort for HttpRestClient {
    async fn analyze(&self, repo_url: &str) -> Result<Value> {
        self.post_json("analyze", &json!({ "repo_url": repo_url }))
            .await
    }

    async fn compare(&self, repo_urls: &[String]) -> Result<Value> {
        self.post_json("compare", &json!({ "repositories": repo_urls }))
            .await
    }

    async fn generate_onboarding_plan(
        &self,
        repo_url: &str,
        experience_level: &str,
    ) -> Result<Value> {
        let body = json!({
            "repo_url": repo_url,
            "experience_level": experience_level,
        });
        self.post_json("generate-onboarding-plan", &body).await
    }

    async fn export_report(
        &self,
        report: &AnalysisViewModel,
        format: ReportFormat,
    ) -> Result<Vec<u8>> {
        let body = json!({
            "report": serde_json::to_value(report)?,
            "format": format.as_str(),
        });
        self.post("export-report", &body)
            .await?
            .binary()
            .await
            .map_err(|e| AnalystError::Network(e.to_string()))
    }

    async fn send_report_pdf(&self, email: &str, report: &AnalysisViewModel) -> Result<()> {
        let body = json!({
            "email": email,
            "report": serde_json::to_value(report)?,
        });
        self.post("send-report-pdf", &body).await?;
        Ok(())
    }
}

/// FastAPI-style errors carry `{"detail": ...}`; fall back to the raw body.
fn detail_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
