//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external
//! adapters: the cache store, process execution, the coverage aggregation
//! service, and the event bus.

use crate::Result;
use crate::cache::{RestoreOutcome, SaveReceipt};
use crate::events::Event;
use crate::ids::RunId;
use crate::job::AggregateReport;
use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;

/// Stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Event bus for publishing and subscribing to run lifecycle events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> Result<()>;

    /// Subscribe to all subsequent events.
    async fn subscribe(&self) -> Result<EventStream>;
}

/// Keyed store of dependency artifact bundles.
///
/// Restore is best-effort: a miss is a signal, not an error. Save replaces
/// any existing entry under the key, which keeps the store self-healing
/// when an entry was corrupted or partially populated.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore the entry under `key` into `dest`, if one exists.
    async fn restore(&self, key: &str, dest: &Path) -> Result<RestoreOutcome>;

    /// Bundle `paths` (relative to `base`) and store them under `key`.
    async fn save(&self, key: &str, paths: &[PathBuf], base: &Path) -> Result<SaveReceipt>;
}

/// Exit status of a spawned command.
#[derive(Debug, Clone, Copy)]
pub struct ExecStatus {
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ExecStatus {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Process execution seam. Install actions and test commands go through
/// this trait so their sequencing is testable without spawning anything.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        command: &str,
        workspace: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ExecStatus>;
}

/// External coverage aggregation service.
///
/// `notify_finish` is called exactly once per run, by the aggregator,
/// after every cell has reached a terminal state.
#[async_trait]
pub trait CoverageReporter: Send + Sync {
    async fn notify_start(&self, run_id: RunId, cell_count: usize) -> Result<()>;

    async fn notify_finish(&self, run_id: RunId, report: &AggregateReport) -> Result<()>;
}
