//! Completion barrier and coverage merge.

use std::collections::HashMap;
use std::path::Path;
use tessera_core::ids::{CellId, RunId};
use tessera_core::job::{AggregateReport, JobResult, JobStatus};
use tessera_core::ports::CoverageReporter;
use tessera_core::{Error, Result};
use tracing::{info, warn};

/// Aggregator lifecycle. `Merging` is only reachable once every expected
/// cell has a terminal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Waiting,
    Merging,
    Done,
    MergeFailed,
}

/// Barrier over the expanded cell set plus the merge step.
///
/// `record` is the all-terminal predicate: it returns true exactly when the
/// last outstanding cell reports, whatever the individual outcomes were.
/// Failed and skipped cells count as terminal; full matrix visibility
/// requires waiting for all of them, not racing to the first failure.
pub struct CoverageAggregator {
    run_id: RunId,
    state: AggregatorState,
    statuses: HashMap<CellId, JobStatus>,
    results: Vec<JobResult>,
}

impl CoverageAggregator {
    pub fn new(run_id: RunId, expected: impl IntoIterator<Item = CellId>) -> Self {
        Self {
            run_id,
            state: AggregatorState::Waiting,
            statuses: expected
                .into_iter()
                .map(|id| (id, JobStatus::Pending))
                .collect(),
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// True once every expected cell has reported a terminal status.
    pub fn is_complete(&self) -> bool {
        self.statuses.values().all(|s| s.is_terminal())
    }

    /// Record one cell's terminal result. Returns whether the barrier is
    /// now satisfied.
    pub fn record(&mut self, result: JobResult) -> Result<bool> {
        if !result.status.is_terminal() {
            return Err(Error::Internal(format!(
                "non-terminal result recorded for cell {}",
                result.cell_id
            )));
        }
        match self.statuses.get_mut(&result.cell_id) {
            Some(status) => *status = result.status,
            None => {
                return Err(Error::Internal(format!(
                    "result for unknown cell {}",
                    result.cell_id
                )));
            }
        }
        self.results.push(result);
        Ok(self.is_complete())
    }

    pub fn results(&self) -> &[JobResult] {
        &self.results
    }

    /// Merge the available artifacts into one report and notify the
    /// aggregation service. Callable only after the barrier is satisfied.
    ///
    /// Cells that produced no artifact are tolerated: partial coverage
    /// data is preferable to blocking the report indefinitely.
    pub async fn merge(
        &mut self,
        report_path: &Path,
        reporter: &dyn CoverageReporter,
    ) -> Result<AggregateReport> {
        if !self.is_complete() {
            let pending = self
                .statuses
                .values()
                .filter(|s| !s.is_terminal())
                .count();
            return Err(Error::Merge(format!(
                "{} cell(s) have not reached a terminal state",
                pending
            )));
        }

        self.state = AggregatorState::Merging;
        info!(run_id = %self.run_id, cells = self.results.len(), "merging coverage artifacts");

        match self.merge_inner(report_path, reporter).await {
            Ok(report) => {
                self.state = AggregatorState::Done;
                Ok(report)
            }
            Err(e) => {
                self.state = AggregatorState::MergeFailed;
                Err(e)
            }
        }
    }

    async fn merge_inner(
        &self,
        report_path: &Path,
        reporter: &dyn CoverageReporter,
    ) -> Result<AggregateReport> {
        if let Some(parent) = report_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Merge(format!("Failed to create report dir: {}", e)))?;
        }

        let mut merged = 0usize;
        let mut missing = 0usize;
        let mut combined = Vec::new();

        for result in &self.results {
            let Some(path) = &result.coverage else {
                missing += 1;
                continue;
            };
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    combined.extend_from_slice(&bytes);
                    if !combined.ends_with(b"\n") {
                        combined.push(b'\n');
                    }
                    merged += 1;
                }
                Err(e) => {
                    warn!(cell = %result.cell, error = %e, "coverage artifact unreadable, skipping");
                    missing += 1;
                }
            }
        }

        tokio::fs::write(report_path, &combined)
            .await
            .map_err(|e| Error::Merge(format!("Failed to write report: {}", e)))?;

        let report = AggregateReport {
            report_path: report_path.to_path_buf(),
            merged,
            missing,
            size_bytes: combined.len() as u64,
            completed_at: chrono::Utc::now(),
        };

        reporter.notify_finish(self.run_id, &report).await?;

        info!(run_id = %self.run_id, merged, missing, "coverage merge completed");
        Ok(report)
    }
}
