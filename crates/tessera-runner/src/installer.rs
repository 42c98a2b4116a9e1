//! Conditional install sequence.
//!
//! Actions run strictly in declaration order. Later actions may assume the
//! side effects of earlier ones (an environment manager being available, a
//! compiler on PATH), so this is a linear pipeline, never reordered.

use std::path::Path;
use std::sync::Arc;
use tessera_core::cell::MatrixCell;
use tessera_core::pipeline::{InstallAction, cell_environment};
use tessera_core::ports::CommandExecutor;
use tessera_core::{Error, Result};
use tracing::{debug, info};

/// What the sequence did, for reporting.
#[derive(Debug, Clone, Default)]
pub struct InstallSummary {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
}

/// Runs the guarded install actions for one cell.
pub struct ConditionalInstaller {
    executor: Arc<dyn CommandExecutor>,
}

impl ConditionalInstaller {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Execute `actions` in declared order.
    ///
    /// Each predicate is evaluated immediately before its action would run,
    /// not pre-computed in bulk. An action whose predicate is false is
    /// skipped with no error; a nonzero exit aborts the remaining sequence
    /// with [`Error::Install`]. There is no retry.
    pub async fn run(
        &self,
        cell: &MatrixCell,
        cache_hit: bool,
        actions: &[InstallAction],
        workspace: &Path,
    ) -> Result<InstallSummary> {
        let env = cell_environment(cell, cache_hit);
        let mut summary = InstallSummary::default();

        for action in actions {
            if !action.when.evaluate(cell, cache_hit) {
                debug!(cell = %cell, action = %action.name, "install action skipped");
                summary.skipped.push(action.name.clone());
                continue;
            }

            info!(cell = %cell, action = %action.name, "install action started");
            let status = self.executor.run(&action.run, workspace, &env).await?;
            if !status.success() {
                return Err(Error::Install {
                    action: action.name.clone(),
                    exit_code: status.exit_code,
                });
            }
            summary.executed.push(action.name.clone());
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tessera_core::cell::{CommsMode, MpiVariant, OsFamily};
    use tessera_core::pipeline::Condition;
    use tessera_core::ports::ExecStatus;

    /// Executor recording commands and failing those listed.
    struct FakeExecutor {
        ran: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeExecutor {
        fn new() -> Self {
            Self {
                ran: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(command: &str) -> Self {
            Self {
                ran: Mutex::new(Vec::new()),
                fail_on: Some(command.to_string()),
            }
        }

        fn commands(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for FakeExecutor {
        async fn run(
            &self,
            command: &str,
            _workspace: &Path,
            _env: &HashMap<String, String>,
        ) -> Result<ExecStatus> {
            self.ran.lock().unwrap().push(command.to_string());
            let exit_code = match &self.fail_on {
                Some(fail) if fail == command => 1,
                _ => 0,
            };
            Ok(ExecStatus {
                exit_code,
                duration_ms: 1,
            })
        }
    }

    fn cell() -> MatrixCell {
        MatrixCell::new(OsFamily::Linux, "3.10", MpiVariant::Mpich, CommsMode::Mpi)
    }

    fn action(name: &str, when: Condition, run: &str) -> InstallAction {
        InstallAction {
            name: name.to_string(),
            when,
            run: run.to_string(),
        }
    }

    #[tokio::test]
    async fn test_declared_order_is_preserved() {
        let executor = Arc::new(FakeExecutor::new());
        let installer = ConditionalInstaller::new(executor.clone());

        let actions = vec![
            action("bootstrap", Condition::Always, "install-manager"),
            action("mpi", Condition::Mpi(MpiVariant::Mpich), "install-mpich"),
            action("build", Condition::CacheMiss, "build-bindings"),
        ];

        installer
            .run(&cell(), false, &actions, &PathBuf::from("/tmp"))
            .await
            .unwrap();

        assert_eq!(
            executor.commands(),
            vec!["install-manager", "install-mpich", "build-bindings"]
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_guarded_build() {
        let executor = Arc::new(FakeExecutor::new());
        let installer = ConditionalInstaller::new(executor.clone());

        let actions = vec![
            action("bootstrap", Condition::Always, "install-manager"),
            action("build", Condition::CacheMiss, "build-bindings"),
        ];

        let summary = installer
            .run(&cell(), true, &actions, &PathBuf::from("/tmp"))
            .await
            .unwrap();

        assert_eq!(executor.commands(), vec!["install-manager"]);
        assert_eq!(summary.skipped, vec!["build"]);
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_sequence() {
        let executor = Arc::new(FakeExecutor::failing_on("install-mpich"));
        let installer = ConditionalInstaller::new(executor.clone());

        let actions = vec![
            action("bootstrap", Condition::Always, "install-manager"),
            action("mpi", Condition::Always, "install-mpich"),
            action("deps", Condition::Always, "install-deps"),
        ];

        let err = installer
            .run(&cell(), false, &actions, &PathBuf::from("/tmp"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Install { ref action, exit_code: 1 } if action == "mpi"));
        // Nothing after the failing action ran.
        assert_eq!(executor.commands(), vec!["install-manager", "install-mpich"]);
    }

    #[tokio::test]
    async fn test_attribute_predicates_select_actions() {
        let executor = Arc::new(FakeExecutor::new());
        let installer = ConditionalInstaller::new(executor.clone());

        let actions = vec![
            action("mpich", Condition::Mpi(MpiVariant::Mpich), "install-mpich"),
            action(
                "openmpi",
                Condition::Mpi(MpiVariant::Openmpi),
                "install-openmpi",
            ),
            action("tcp-extras", Condition::Comms(CommsMode::Tcp), "install-tcp"),
        ];

        installer
            .run(&cell(), false, &actions, &PathBuf::from("/tmp"))
            .await
            .unwrap();

        assert_eq!(executor.commands(), vec!["install-mpich"]);
    }
}
