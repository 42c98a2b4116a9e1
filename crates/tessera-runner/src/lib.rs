//! Command execution for Tessera cells.
//!
//! One cell's job runs a linear pipeline: the conditional install sequence,
//! then the OS-selected test command. Both go through the `CommandExecutor`
//! port, so every ordering and skip rule is testable without a process.

pub mod installer;
pub mod shell;
pub mod suite;

pub use installer::{ConditionalInstaller, InstallSummary};
pub use shell::{OutputLine, OutputStream, ShellExecutor};
pub use suite::TestRunner;
