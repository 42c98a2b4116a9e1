//! Matrix cell types.
//!
//! A cell is one concrete combination of environment attributes under test.
//! Cells are resolved once per run by the expander and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating-system family of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Linux,
    Macos,
    /// Reserved: parses but is refused by the expander.
    Windows,
}

impl OsFamily {
    pub fn is_schedulable(&self) -> bool {
        !matches!(self, OsFamily::Windows)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::Macos => "macos",
            OsFamily::Windows => "windows",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Worker communication mode exercised by a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommsMode {
    #[serde(rename = "m")]
    Mpi,
    #[serde(rename = "l")]
    Local,
    #[serde(rename = "t")]
    Tcp,
}

impl CommsMode {
    /// Single-letter form used in cache keys and environment exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommsMode::Mpi => "m",
            CommsMode::Local => "l",
            CommsMode::Tcp => "t",
        }
    }
}

impl fmt::Display for CommsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message-passing implementation installed into a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MpiVariant {
    Mpich,
    Openmpi,
    /// A site-provided build, installed by the pipeline's own actions.
    Custom,
}

impl MpiVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            MpiVariant::Mpich => "mpich",
            MpiVariant::Openmpi => "openmpi",
            MpiVariant::Custom => "custom",
        }
    }
}

impl fmt::Display for MpiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One concrete environment combination under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixCell {
    pub os: OsFamily,
    /// Language-runtime version, e.g. `3.10`.
    pub runtime: String,
    pub mpi: MpiVariant,
    pub comms: CommsMode,
}

impl MatrixCell {
    pub fn new(
        os: OsFamily,
        runtime: impl Into<String>,
        mpi: MpiVariant,
        comms: CommsMode,
    ) -> Self {
        Self {
            os,
            runtime: runtime.into(),
            mpi,
            comms,
        }
    }

    /// Filename-safe identifier, e.g. `linux-py3.10-mpich-m`.
    pub fn slug(&self) -> String {
        format!("{}-py{}-{}-{}", self.os, self.runtime, self.mpi, self.comms)
    }
}

impl fmt::Display for MatrixCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/py{}/{}/{}",
            self.os, self.runtime, self.mpi, self.comms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comms_mode_serde_single_letter() {
        let json = serde_json::to_string(&CommsMode::Local).unwrap();
        assert_eq!(json, "\"l\"");
        let back: CommsMode = serde_json::from_str("\"t\"").unwrap();
        assert_eq!(back, CommsMode::Tcp);
    }

    #[test]
    fn test_cell_slug() {
        let cell = MatrixCell::new(OsFamily::Macos, "3.9", MpiVariant::Custom, CommsMode::Mpi);
        assert_eq!(cell.slug(), "macos-py3.9-custom-m");
    }

    #[test]
    fn test_windows_reserved() {
        assert!(!OsFamily::Windows.is_schedulable());
        assert!(OsFamily::Linux.is_schedulable());
    }
}
