//! Pipeline definition types.
//!
//! These types represent the user-authored `tessera.yaml` configuration:
//! the matrix to expand, the dependency cache, the ordered install actions,
//! the per-OS test commands, and the coverage service endpoint.

use crate::cell::{CommsMode, MatrixCell, MpiVariant, OsFamily};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Branch ref the run validates; part of the cache key.
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub matrix: MatrixSpec,
    #[serde(default)]
    pub cache: CacheSpec,
    #[serde(default)]
    pub install: Vec<InstallAction>,
    pub test: TestCommands,
    #[serde(default)]
    pub coverage: CoverageSpec,
}

impl PipelineSpec {
    /// Static checks that must hold before any cell is scheduled.
    pub fn validate(&self) -> crate::Result<()> {
        if self.matrix.axes.os.is_empty() {
            return Err(crate::Error::Configuration("os axis is empty".into()));
        }
        if self.matrix.axes.runtime.is_empty() {
            return Err(crate::Error::Configuration("runtime axis is empty".into()));
        }
        if self.matrix.axes.comms.is_empty() {
            return Err(crate::Error::Configuration("comms axis is empty".into()));
        }

        let mut os_in_play: Vec<OsFamily> = self.matrix.axes.os.clone();
        for entry in self.matrix.include.iter().filter(|e| e.enabled) {
            if let Some(os) = entry.os {
                os_in_play.push(os);
            }
        }
        for os in os_in_play {
            if os.is_schedulable() && self.test.command_for(os).is_none() {
                return Err(crate::Error::NoTestCommand { os: os.to_string() });
            }
        }
        Ok(())
    }
}

/// Matrix declaration: base axes, extra cells, and exclusion rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixSpec {
    pub axes: AxisSpec,
    #[serde(default)]
    pub include: Vec<IncludeEntry>,
    #[serde(default)]
    pub exclude: Vec<ExcludeRule>,
}

/// Ordered axis values; the base cell set is their Cartesian product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisSpec {
    pub os: Vec<OsFamily>,
    pub runtime: Vec<String>,
    /// Defaults to a single mpich column when the axis is not declared.
    #[serde(default = "default_mpi_axis")]
    pub mpi: Vec<MpiVariant>,
    pub comms: Vec<CommsMode>,
}

fn default_mpi_axis() -> Vec<MpiVariant> {
    vec![MpiVariant::Mpich]
}

/// An extra cell supplementing the Cartesian product.
///
/// Every attribute must be specified for an enabled entry; a disabled entry
/// is an inert declaration and is never expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeEntry {
    #[serde(default)]
    pub os: Option<OsFamily>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub mpi: Option<MpiVariant>,
    #[serde(default)]
    pub comms: Option<CommsMode>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl IncludeEntry {
    pub fn from_cell(cell: &MatrixCell) -> Self {
        Self {
            os: Some(cell.os),
            runtime: Some(cell.runtime.clone()),
            mpi: Some(cell.mpi),
            comms: Some(cell.comms),
            enabled: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Partial attribute match; a cell matching every specified attribute is
/// dropped from the expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRule {
    #[serde(default)]
    pub os: Option<OsFamily>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub mpi: Option<MpiVariant>,
    #[serde(default)]
    pub comms: Option<CommsMode>,
}

impl ExcludeRule {
    pub fn matches(&self, cell: &MatrixCell) -> bool {
        self.os.map_or(true, |os| os == cell.os)
            && self.runtime.as_ref().map_or(true, |r| *r == cell.runtime)
            && self.mpi.map_or(true, |m| m == cell.mpi)
            && self.comms.map_or(true, |c| c == cell.comms)
    }
}

/// One guarded install step: a predicate over the cell and the cache
/// outcome, and a command to run when it holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallAction {
    pub name: String,
    #[serde(default)]
    pub when: Condition,
    pub run: String,
}

/// Predicate language for install actions.
///
/// Deliberately closed and pure: evaluation needs only the cell attributes
/// and the cache-hit flag, so ordering and skip semantics are testable with
/// no process execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    #[default]
    Always,
    Os(OsFamily),
    Comms(CommsMode),
    Mpi(MpiVariant),
    Runtime(String),
    CacheHit,
    CacheMiss,
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn evaluate(&self, cell: &MatrixCell, cache_hit: bool) -> bool {
        match self {
            Condition::Always => true,
            Condition::Os(os) => cell.os == *os,
            Condition::Comms(comms) => cell.comms == *comms,
            Condition::Mpi(mpi) => cell.mpi == *mpi,
            Condition::Runtime(runtime) => cell.runtime == *runtime,
            Condition::CacheHit => cache_hit,
            Condition::CacheMiss => !cache_hit,
            Condition::All(conds) => conds.iter().all(|c| c.evaluate(cell, cache_hit)),
            Condition::Any(conds) => conds.iter().any(|c| c.evaluate(cell, cache_hit)),
            Condition::Not(cond) => !cond.evaluate(cell, cache_hit),
        }
    }
}

/// Test command variants, selected by the cell's OS family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCommands {
    #[serde(default)]
    pub linux: Option<String>,
    #[serde(default)]
    pub macos: Option<String>,
    #[serde(default)]
    pub windows: Option<String>,
}

impl TestCommands {
    pub fn command_for(&self, os: OsFamily) -> Option<&str> {
        match os {
            OsFamily::Linux => self.linux.as_deref(),
            OsFamily::Macos => self.macos.as_deref(),
            OsFamily::Windows => self.windows.as_deref(),
        }
    }
}

/// Dependency cache declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSpec {
    /// Store location; defaults to `.tessera/cache` under the workspace.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Workspace-relative paths bundled into each entry.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Coverage merge and reporting declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSpec {
    /// Where the consolidated report is written.
    #[serde(default = "default_report_path")]
    pub report: PathBuf,
    /// Aggregation service endpoint; omitted means report-only runs.
    #[serde(default)]
    pub service_url: Option<String>,
}

impl Default for CoverageSpec {
    fn default() -> Self {
        Self {
            report: default_report_path(),
            service_url: None,
        }
    }
}

fn default_report_path() -> PathBuf {
    PathBuf::from("coverage/combined.cov")
}

/// Environment exported to every command spawned for a cell.
pub fn cell_environment(cell: &MatrixCell, cache_hit: bool) -> HashMap<String, String> {
    HashMap::from([
        ("MATRIX_OS".to_string(), cell.os.to_string()),
        ("MATRIX_RUNTIME".to_string(), cell.runtime.clone()),
        ("MATRIX_MPI".to_string(), cell.mpi.to_string()),
        ("MATRIX_COMMS".to_string(), cell.comms.to_string()),
        (
            "CACHE_HIT".to_string(),
            if cache_hit { "1" } else { "0" }.to_string(),
        ),
    ])
}
