//! Run lifecycle events.

use crate::cell::MatrixCell;
use crate::ids::{CellId, RunId};
use crate::job::JobStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All events emitted over the course of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunAdmitted(RunAdmittedPayload),
    RunRejected(RunRejectedPayload),
    MatrixExpanded(MatrixExpandedPayload),
    CellStarted(CellPayload),
    CacheHit(CachePayload),
    CacheMiss(CachePayload),
    CacheSaved(CachePayload),
    InstallFailed(InstallFailedPayload),
    CellCompleted(CellCompletedPayload),
    MergeStarted(MergePayload),
    MergeCompleted(MergeCompletedPayload),
    MergeFailed(MergeFailedPayload),
}

impl Event {
    /// Returns the bus subject for this event.
    pub fn subject(&self) -> String {
        match self {
            Event::RunAdmitted(p) => format!("run.admitted.{}", p.run_id),
            Event::RunRejected(_) => "run.rejected".to_string(),
            Event::MatrixExpanded(p) => format!("matrix.expanded.{}", p.run_id),
            Event::CellStarted(p) => format!("run.{}.cell.{}.started", p.run_id, p.cell_id),
            Event::CacheHit(p) => format!("cache.hit.{}", p.run_id),
            Event::CacheMiss(p) => format!("cache.miss.{}", p.run_id),
            Event::CacheSaved(p) => format!("cache.saved.{}", p.run_id),
            Event::InstallFailed(p) => {
                format!("run.{}.cell.{}.install_failed", p.run_id, p.cell_id)
            }
            Event::CellCompleted(p) => format!("run.{}.cell.{}.completed", p.run_id, p.cell_id),
            Event::MergeStarted(p) => format!("coverage.merge.started.{}", p.run_id),
            Event::MergeCompleted(p) => format!("coverage.merge.completed.{}", p.run_id),
            Event::MergeFailed(p) => format!("coverage.merge.failed.{}", p.run_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunAdmittedPayload {
    pub run_id: RunId,
    pub git_ref: String,
    pub admitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRejectedPayload {
    pub git_ref: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixExpandedPayload {
    pub run_id: RunId,
    pub cell_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellPayload {
    pub run_id: RunId,
    pub cell_id: CellId,
    pub cell: MatrixCell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePayload {
    pub run_id: RunId,
    pub cell_id: CellId,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallFailedPayload {
    pub run_id: RunId,
    pub cell_id: CellId,
    pub action: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellCompletedPayload {
    pub run_id: RunId,
    pub cell_id: CellId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePayload {
    pub run_id: RunId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeCompletedPayload {
    pub run_id: RunId,
    pub merged: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFailedPayload {
    pub run_id: RunId,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        let run_id = RunId::new();
        let event = Event::CacheMiss(CachePayload {
            run_id,
            cell_id: CellId::new(),
            key: "deps-main-py3.10-m".to_string(),
        });
        assert_eq!(event.subject(), format!("cache.miss.{}", run_id));
    }
}
