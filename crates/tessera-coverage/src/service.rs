//! Coverage aggregation service reporters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::ids::RunId;
use tessera_core::job::AggregateReport;
use tessera_core::ports::CoverageReporter;
use tessera_core::{Error, Result};
use tracing::{debug, info};

/// Payload announcing a run to the aggregation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginPayload {
    pub run_id: String,
    pub parallel_jobs: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Payload closing a run out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishPayload {
    pub run_id: String,
    pub merged: usize,
    pub missing: usize,
    pub size_bytes: u64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Webhook reporter for services speaking a begin/finish pair.
pub struct HttpReporter {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReporter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CoverageReporter for HttpReporter {
    async fn notify_start(&self, run_id: RunId, cell_count: usize) -> Result<()> {
        let payload = BeginPayload {
            run_id: run_id.to_string(),
            parallel_jobs: cell_count,
            started_at: chrono::Utc::now(),
        };

        let response = self
            .client
            .post(format!("{}/begin", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "begin rejected with status {}",
                response.status()
            )));
        }
        debug!(%run_id, cell_count, "aggregation service notified of start");
        Ok(())
    }

    async fn notify_finish(&self, run_id: RunId, report: &AggregateReport) -> Result<()> {
        let payload = FinishPayload {
            run_id: run_id.to_string(),
            merged: report.merged,
            missing: report.missing,
            size_bytes: report.size_bytes,
            completed_at: report.completed_at,
        };

        let response = self
            .client
            .post(format!("{}/finish", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notify(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Notify(format!(
                "finish rejected with status {}",
                response.status()
            )));
        }
        info!(%run_id, merged = report.merged, "aggregation service notified of finish");
        Ok(())
    }
}

/// Reporter for offline or report-only runs.
pub struct NullReporter;

#[async_trait]
impl CoverageReporter for NullReporter {
    async fn notify_start(&self, run_id: RunId, cell_count: usize) -> Result<()> {
        debug!(%run_id, cell_count, "no aggregation service configured");
        Ok(())
    }

    async fn notify_finish(&self, run_id: RunId, _report: &AggregateReport) -> Result<()> {
        debug!(%run_id, "no aggregation service configured");
        Ok(())
    }
}
