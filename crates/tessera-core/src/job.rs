//! Per-cell job results and run-level reports.

use crate::cell::MatrixCell;
use crate::ids::{CellId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failure | JobStatus::Skipped
        )
    }
}

/// Terminal outcome of one cell's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub cell_id: CellId,
    pub cell: MatrixCell,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    /// Per-cell coverage artifact, present on success or attempted
    /// completion of a failing suite.
    pub coverage: Option<PathBuf>,
    pub cache_hit: bool,
    pub duration_ms: u64,
}

impl JobResult {
    pub fn skipped(cell_id: CellId, cell: MatrixCell) -> Self {
        Self {
            cell_id,
            cell,
            status: JobStatus::Skipped,
            exit_code: None,
            coverage: None,
            cache_hit: false,
            duration_ms: 0,
        }
    }
}

/// Consolidated coverage report, built once per run after the barrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub report_path: PathBuf,
    /// Artifacts that contributed to the merge.
    pub merged: usize,
    /// Terminal cells that produced no artifact.
    pub missing: usize,
    pub size_bytes: u64,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub git_ref: String,
    /// False when the trigger gate rejected the event; no cells were
    /// scheduled in that case.
    pub admitted: bool,
    pub results: Vec<JobResult>,
    pub report: Option<AggregateReport>,
    pub merge_error: Option<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn failed_cells(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == JobStatus::Failure)
            .count()
    }

    /// Full success: admitted, every cell passed, and the merge completed.
    pub fn is_success(&self) -> bool {
        self.admitted && self.failed_cells() == 0 && self.merge_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failure.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
