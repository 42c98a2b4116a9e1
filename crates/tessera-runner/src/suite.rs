//! Test-suite execution for one cell.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::cell::MatrixCell;
use tessera_core::ids::CellId;
use tessera_core::job::{JobResult, JobStatus};
use tessera_core::pipeline::{TestCommands, cell_environment};
use tessera_core::ports::CommandExecutor;
use tessera_core::{Error, Result};
use tracing::info;

/// Runs the OS-selected test command for a cell and collects its coverage
/// artifact. A failing suite never cancels or alters sibling cells; the
/// failure is recorded in the returned [`JobResult`] and that is all.
pub struct TestRunner {
    commands: TestCommands,
    executor: Arc<dyn CommandExecutor>,
}

impl TestRunner {
    pub fn new(commands: TestCommands, executor: Arc<dyn CommandExecutor>) -> Self {
        Self { commands, executor }
    }

    /// Where a cell's suite is told to write its coverage data.
    pub fn coverage_path(workspace: &Path, cell: &MatrixCell) -> PathBuf {
        workspace.join(format!(".coverage.{}", cell.slug()))
    }

    pub async fn run(
        &self,
        cell_id: CellId,
        cell: &MatrixCell,
        cache_hit: bool,
        workspace: &Path,
    ) -> Result<JobResult> {
        let command = self
            .commands
            .command_for(cell.os)
            .ok_or_else(|| Error::NoTestCommand {
                os: cell.os.to_string(),
            })?;

        let coverage_path = Self::coverage_path(workspace, cell);
        let mut env = cell_environment(cell, cache_hit);
        env.insert(
            "COVERAGE_FILE".to_string(),
            coverage_path.to_string_lossy().to_string(),
        );

        info!(cell = %cell, command = %command, "test suite started");
        let status = self.executor.run(command, workspace, &env).await?;

        let job_status = if status.success() {
            JobStatus::Success
        } else {
            JobStatus::Failure
        };
        // A failing suite may still have written partial coverage data;
        // keep whatever made it to disk.
        let coverage = coverage_path.exists().then_some(coverage_path);

        info!(cell = %cell, status = ?job_status, "test suite finished");
        Ok(JobResult {
            cell_id,
            cell: cell.clone(),
            status: job_status,
            exit_code: Some(status.exit_code),
            coverage,
            cache_hit,
            duration_ms: status.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tessera_core::cell::{CommsMode, MpiVariant, OsFamily};
    use tessera_core::ports::ExecStatus;

    /// Executor standing in for a suite: writes the coverage file the
    /// environment points at, then exits with the configured code.
    struct SuiteStub {
        exit_code: i32,
        write_coverage: bool,
    }

    #[async_trait]
    impl CommandExecutor for SuiteStub {
        async fn run(
            &self,
            _command: &str,
            _workspace: &Path,
            env: &HashMap<String, String>,
        ) -> Result<ExecStatus> {
            if self.write_coverage {
                let path = env.get("COVERAGE_FILE").unwrap();
                std::fs::write(path, b"line data").unwrap();
            }
            Ok(ExecStatus {
                exit_code: self.exit_code,
                duration_ms: 5,
            })
        }
    }

    fn commands() -> TestCommands {
        TestCommands {
            linux: Some("./ci/run-tests.sh".to_string()),
            macos: Some("./ci/run-tests.sh --macos".to_string()),
            windows: None,
        }
    }

    fn cell(os: OsFamily) -> MatrixCell {
        MatrixCell::new(os, "3.10", MpiVariant::Mpich, CommsMode::Local)
    }

    #[tokio::test]
    async fn test_passing_suite_records_artifact() {
        let workspace = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(
            commands(),
            Arc::new(SuiteStub {
                exit_code: 0,
                write_coverage: true,
            }),
        );

        let result = runner
            .run(CellId::new(), &cell(OsFamily::Linux), false, workspace.path())
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.coverage.unwrap().exists());
    }

    #[tokio::test]
    async fn test_failing_suite_keeps_partial_artifact() {
        let workspace = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(
            commands(),
            Arc::new(SuiteStub {
                exit_code: 2,
                write_coverage: true,
            }),
        );

        let result = runner
            .run(CellId::new(), &cell(OsFamily::Linux), true, workspace.path())
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failure);
        assert_eq!(result.exit_code, Some(2));
        // Attempted completion still contributes coverage data.
        assert!(result.coverage.is_some());
        assert!(result.cache_hit);
    }

    #[tokio::test]
    async fn test_crashed_suite_has_no_artifact() {
        let workspace = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(
            commands(),
            Arc::new(SuiteStub {
                exit_code: 137,
                write_coverage: false,
            }),
        );

        let result = runner
            .run(CellId::new(), &cell(OsFamily::Macos), false, workspace.path())
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failure);
        assert!(result.coverage.is_none());
    }

    #[tokio::test]
    async fn test_missing_command_for_os() {
        let runner = TestRunner::new(
            TestCommands::default(),
            Arc::new(SuiteStub {
                exit_code: 0,
                write_coverage: false,
            }),
        );

        let err = runner
            .run(
                CellId::new(),
                &cell(OsFamily::Linux),
                false,
                &PathBuf::from("/tmp"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoTestCommand { .. }));
    }
}
