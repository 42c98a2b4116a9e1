//! Shell-based command execution on the host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tessera_core::Result;
use tessera_core::ports::{CommandExecutor, ExecStatus};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Output line from command execution.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
    pub line_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Executor spawning commands through `sh -c` on the host.
///
/// Commands run to completion: there is no retry and no wall-clock limit
/// here, both belong to whatever schedules the run.
pub struct ShellExecutor {
    output: Option<mpsc::Sender<OutputLine>>,
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self { output: None }
    }

    /// Forward output lines to `tx` in addition to the trace log.
    pub fn with_output(tx: mpsc::Sender<OutputLine>) -> Self {
        Self { output: Some(tx) }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(
        &self,
        command: &str,
        workspace: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ExecStatus> {
        let start = std::time::Instant::now();

        info!(command = %command, workspace = %workspace.display(), "Executing shell command");

        let mut env_vars: HashMap<String, String> = std::env::vars().collect();
        env_vars.extend(env.clone());

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(workspace)
            .envs(&env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                tessera_core::Error::Internal(format!("Failed to spawn process: {}", e))
            })?;

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let stdout_tx = self.output.clone();
        let stdout_handle = tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            let mut line_num = 0u32;

            while let Ok(Some(line)) = lines.next_line().await {
                line_num += 1;
                debug!(line = %line, "stdout");
                if let Some(tx) = &stdout_tx {
                    let output = OutputLine {
                        stream: OutputStream::Stdout,
                        content: line,
                        line_number: line_num,
                        timestamp: chrono::Utc::now(),
                    };
                    if tx.send(output).await.is_err() {
                        break;
                    }
                }
            }
        });

        let stderr_tx = self.output.clone();
        let stderr_handle = tokio::spawn(async move {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            let mut line_num = 0u32;

            while let Ok(Some(line)) = lines.next_line().await {
                line_num += 1;
                debug!(line = %line, "stderr");
                if let Some(tx) = &stderr_tx {
                    let output = OutputLine {
                        stream: OutputStream::Stderr,
                        content: line,
                        line_number: line_num,
                        timestamp: chrono::Utc::now(),
                    };
                    if tx.send(output).await.is_err() {
                        break;
                    }
                }
            }
        });

        let status = child.wait().await.map_err(|e| {
            tessera_core::Error::Internal(format!("Failed to wait for process: {}", e))
        })?;

        let _ = stdout_handle.await;
        let _ = stderr_handle.await;

        let exit_code = status.code().unwrap_or(-1);
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(exit_code, duration_ms, "Command completed");

        Ok(ExecStatus {
            exit_code,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_shell_executor_success() {
        let (tx, mut rx) = mpsc::channel(100);
        let executor = ShellExecutor::with_output(tx);

        let status = executor
            .run("echo hello", &PathBuf::from("/tmp"), &HashMap::new())
            .await
            .unwrap();
        assert!(status.success());
        assert_eq!(status.exit_code, 0);

        let line = rx.recv().await.unwrap();
        assert_eq!(line.content, "hello");
        assert_eq!(line.stream, OutputStream::Stdout);
    }

    #[tokio::test]
    async fn test_shell_executor_failure() {
        let executor = ShellExecutor::new();

        let status = executor
            .run("exit 3", &PathBuf::from("/tmp"), &HashMap::new())
            .await
            .unwrap();
        assert!(!status.success());
        assert_eq!(status.exit_code, 3);
    }

    #[tokio::test]
    async fn test_shell_executor_passes_environment() {
        let executor = ShellExecutor::new();
        let env = HashMap::from([("MATRIX_COMMS".to_string(), "t".to_string())]);

        let status = executor
            .run("test \"$MATRIX_COMMS\" = t", &PathBuf::from("/tmp"), &env)
            .await
            .unwrap();
        assert!(status.success());
    }
}
