//! Run orchestration: admit, expand, fan out, barrier, aggregate.

use crate::gate::{ChangeEvent, TriggerGate};
use crate::matrix::MatrixExpander;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_cache::keys;
use tessera_core::cell::MatrixCell;
use tessera_core::events::{
    CachePayload, CellCompletedPayload, CellPayload, Event, InstallFailedPayload,
    MatrixExpandedPayload, MergeCompletedPayload, MergeFailedPayload, MergePayload,
    RunAdmittedPayload, RunRejectedPayload,
};
use tessera_core::ids::{CellId, RunId};
use tessera_core::job::{JobResult, JobStatus, RunSummary};
use tessera_core::pipeline::{InstallAction, PipelineSpec, TestCommands};
use tessera_core::ports::{CacheStore, CommandExecutor, CoverageReporter, EventBus};
use tessera_core::{Error, Result};
use tessera_coverage::CoverageAggregator;
use tessera_runner::{ConditionalInstaller, TestRunner};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Drives one pipeline run end to end.
///
/// Admission happens once; every resolved cell then runs as its own task
/// with no shared mutable state beyond the cache store, and the only
/// synchronization point is the wait-all join feeding the aggregator.
/// There is no cancellation: a failed cell never cancels its siblings.
pub struct Orchestrator {
    gate: TriggerGate,
    expander: MatrixExpander,
    store: Arc<dyn CacheStore>,
    executor: Arc<dyn CommandExecutor>,
    reporter: Arc<dyn CoverageReporter>,
    bus: Arc<dyn EventBus>,
}

/// Everything a cell task needs, shared by reference.
struct CellContext {
    run_id: RunId,
    git_ref: String,
    workspace: PathBuf,
    cache_paths: Vec<PathBuf>,
    install: Vec<InstallAction>,
    test: TestCommands,
    store: Arc<dyn CacheStore>,
    executor: Arc<dyn CommandExecutor>,
    bus: Arc<dyn EventBus>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CacheStore>,
        executor: Arc<dyn CommandExecutor>,
        reporter: Arc<dyn CoverageReporter>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            gate: TriggerGate::new(),
            expander: MatrixExpander::new(),
            store,
            executor,
            reporter,
            bus,
        }
    }

    pub async fn execute(
        &self,
        event: &ChangeEvent,
        spec: &PipelineSpec,
        workspace: &Path,
    ) -> Result<RunSummary> {
        let start = std::time::Instant::now();
        let run_id = RunId::new();

        if !self.gate.admit(event) {
            info!(%run_id, git_ref = %spec.git_ref, "run rejected, zero cells scheduled");
            self.bus
                .publish(Event::RunRejected(RunRejectedPayload {
                    git_ref: spec.git_ref.clone(),
                    reason: "change is in draft state".to_string(),
                }))
                .await?;
            return Ok(RunSummary {
                run_id,
                git_ref: spec.git_ref.clone(),
                admitted: false,
                results: Vec::new(),
                report: None,
                merge_error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        spec.validate()?;
        let cells = self.expander.expand(&spec.matrix)?;

        self.bus
            .publish(Event::RunAdmitted(RunAdmittedPayload {
                run_id,
                git_ref: spec.git_ref.clone(),
                admitted_at: chrono::Utc::now(),
            }))
            .await?;
        self.bus
            .publish(Event::MatrixExpanded(MatrixExpandedPayload {
                run_id,
                cell_count: cells.len(),
            }))
            .await?;
        info!(%run_id, cells = cells.len(), "matrix expanded");

        if let Err(e) = self.reporter.notify_start(run_id, cells.len()).await {
            // A deaf aggregation service should not stop the matrix.
            warn!(%run_id, error = %e, "aggregation service start notification failed");
        }

        let assigned: Vec<(CellId, MatrixCell)> =
            cells.into_iter().map(|c| (CellId::new(), c)).collect();
        let mut aggregator =
            CoverageAggregator::new(run_id, assigned.iter().map(|(id, _)| *id));

        let ctx = Arc::new(CellContext {
            run_id,
            git_ref: spec.git_ref.clone(),
            workspace: workspace.to_path_buf(),
            cache_paths: spec.cache.paths.clone(),
            install: spec.install.clone(),
            test: spec.test.clone(),
            store: self.store.clone(),
            executor: self.executor.clone(),
            bus: self.bus.clone(),
        });

        let mut join_set = JoinSet::new();
        for (cell_id, cell) in assigned {
            let ctx = ctx.clone();
            join_set.spawn(async move { run_cell(ctx, cell_id, cell).await });
        }

        // The barrier: every cell must reach a terminal state before the
        // aggregator may merge, whatever the individual outcomes.
        while let Some(joined) = join_set.join_next().await {
            let result =
                joined.map_err(|e| Error::Internal(format!("cell task panicked: {}", e)))?;
            aggregator.record(result)?;
        }

        self.bus
            .publish(Event::MergeStarted(MergePayload { run_id }))
            .await?;
        let report_path = workspace.join(&spec.coverage.report);
        let (report, merge_error) = match aggregator
            .merge(&report_path, self.reporter.as_ref())
            .await
        {
            Ok(report) => {
                self.bus
                    .publish(Event::MergeCompleted(MergeCompletedPayload {
                        run_id,
                        merged: report.merged,
                        missing: report.missing,
                    }))
                    .await?;
                (Some(report), None)
            }
            Err(e) => {
                error!(%run_id, error = %e, "coverage aggregation failed");
                self.bus
                    .publish(Event::MergeFailed(MergeFailedPayload {
                        run_id,
                        error: e.to_string(),
                    }))
                    .await?;
                (None, Some(e.to_string()))
            }
        };

        Ok(RunSummary {
            run_id,
            git_ref: spec.git_ref.clone(),
            admitted: true,
            results: aggregator.results().to_vec(),
            report,
            merge_error,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn emit(bus: &Arc<dyn EventBus>, event: Event) {
    if let Err(e) = bus.publish(event).await {
        warn!(error = %e, "event publish failed");
    }
}

/// One cell's linear job: restore, install, test, save. Always produces a
/// terminal result; every failure is isolated to this cell.
async fn run_cell(ctx: Arc<CellContext>, cell_id: CellId, cell: MatrixCell) -> JobResult {
    let start = std::time::Instant::now();
    emit(
        &ctx.bus,
        Event::CellStarted(CellPayload {
            run_id: ctx.run_id,
            cell_id,
            cell: cell.clone(),
        }),
    )
    .await;

    let key = keys::resolve(&ctx.git_ref, &cell);
    let cache_hit = match ctx.store.restore(&key, &ctx.workspace).await {
        Ok(outcome) => outcome.hit,
        Err(e) => {
            // Restore is best-effort: a broken store only costs a rebuild.
            warn!(%cell, error = %e, "cache restore failed, treating as miss");
            false
        }
    };
    let cache_payload = CachePayload {
        run_id: ctx.run_id,
        cell_id,
        key: key.clone(),
    };
    let cache_event = if cache_hit {
        Event::CacheHit(cache_payload)
    } else {
        Event::CacheMiss(cache_payload)
    };
    emit(&ctx.bus, cache_event).await;

    let installer = ConditionalInstaller::new(ctx.executor.clone());
    if let Err(e) = installer
        .run(&cell, cache_hit, &ctx.install, &ctx.workspace)
        .await
    {
        error!(%cell, error = %e, "install sequence failed");
        let exit_code = if let Error::Install { action, exit_code } = &e {
            emit(
                &ctx.bus,
                Event::InstallFailed(InstallFailedPayload {
                    run_id: ctx.run_id,
                    cell_id,
                    action: action.clone(),
                    exit_code: *exit_code,
                }),
            )
            .await;
            Some(*exit_code)
        } else {
            None
        };
        let result = JobResult {
            cell_id,
            cell,
            status: JobStatus::Failure,
            exit_code,
            coverage: None,
            cache_hit,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        emit(
            &ctx.bus,
            Event::CellCompleted(CellCompletedPayload {
                run_id: ctx.run_id,
                cell_id,
                status: result.status,
            }),
        )
        .await;
        return result;
    }

    let runner = TestRunner::new(ctx.test.clone(), ctx.executor.clone());
    let mut result = match runner.run(cell_id, &cell, cache_hit, &ctx.workspace).await {
        Ok(result) => result,
        Err(e) => {
            error!(%cell, error = %e, "test runner failed");
            JobResult {
                cell_id,
                cell: cell.clone(),
                status: JobStatus::Failure,
                exit_code: None,
                coverage: None,
                cache_hit,
                duration_ms: 0,
            }
        }
    };
    result.duration_ms = start.elapsed().as_millis() as u64;

    if result.status == JobStatus::Success {
        // Save runs after every successful job, hit or miss: overwriting
        // the entry keeps the cache self-healing.
        match ctx
            .store
            .save(&key, &ctx.cache_paths, &ctx.workspace)
            .await
        {
            Ok(_) => {
                emit(
                    &ctx.bus,
                    Event::CacheSaved(CachePayload {
                        run_id: ctx.run_id,
                        cell_id,
                        key,
                    }),
                )
                .await;
            }
            Err(e) => warn!(%cell, error = %e, "cache save failed"),
        }
    }

    emit(
        &ctx.bus,
        Event::CellCompleted(CellCompletedPayload {
            run_id: ctx.run_id,
            cell_id,
            status: result.status,
        }),
    )
    .await;
    result
}
