//! Matrix expansion.

use tessera_core::cell::MatrixCell;
use tessera_core::pipeline::{IncludeEntry, MatrixSpec};
use tessera_core::{Error, Result};

/// Expander turning a matrix declaration into the concrete cell set.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand the base axes into their Cartesian product, add the enabled
    /// include entries, and drop cells matching an exclude rule.
    ///
    /// The result carries no ordering contract: cells are scheduled for
    /// independent, unordered, concurrent execution.
    pub fn expand(&self, spec: &MatrixSpec) -> Result<Vec<MatrixCell>> {
        let mut cells = Vec::new();

        for os in &spec.axes.os {
            for runtime in &spec.axes.runtime {
                for mpi in &spec.axes.mpi {
                    for comms in &spec.axes.comms {
                        let cell = MatrixCell::new(*os, runtime.clone(), *mpi, *comms);
                        if cells.contains(&cell) {
                            return Err(Error::Configuration(format!(
                                "duplicate axis values produce cell {} twice",
                                cell
                            )));
                        }
                        cells.push(cell);
                    }
                }
            }
        }

        for (index, entry) in spec.include.iter().enumerate() {
            if !entry.enabled {
                // Disabled entries are inert declarations, not cells.
                continue;
            }
            let cell = resolve_include(index, entry)?;
            if !cells.contains(&cell) {
                cells.push(cell);
            }
        }

        cells.retain(|cell| !spec.exclude.iter().any(|rule| rule.matches(cell)));

        if let Some(cell) = cells.iter().find(|c| !c.os.is_schedulable()) {
            return Err(Error::Configuration(format!(
                "os `{}` is reserved and cannot be scheduled (cell {})",
                cell.os, cell
            )));
        }

        Ok(cells)
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// An enabled include entry must fully specify every axis attribute, even
/// those absent from the base axes.
fn resolve_include(index: usize, entry: &IncludeEntry) -> Result<MatrixCell> {
    let os = entry.os.ok_or(Error::IncompleteInclude {
        index,
        attribute: "os",
    })?;
    let runtime = entry
        .runtime
        .clone()
        .ok_or(Error::IncompleteInclude {
            index,
            attribute: "runtime",
        })?;
    let mpi = entry.mpi.ok_or(Error::IncompleteInclude {
        index,
        attribute: "mpi",
    })?;
    let comms = entry.comms.ok_or(Error::IncompleteInclude {
        index,
        attribute: "comms",
    })?;
    Ok(MatrixCell::new(os, runtime, mpi, comms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tessera_core::cell::{CommsMode, MpiVariant, OsFamily};
    use tessera_core::pipeline::{AxisSpec, ExcludeRule};

    fn base_spec() -> MatrixSpec {
        MatrixSpec {
            axes: AxisSpec {
                os: vec![OsFamily::Linux],
                runtime: vec!["3.9".to_string(), "3.10".to_string()],
                mpi: vec![MpiVariant::Mpich],
                comms: vec![CommsMode::Mpi, CommsMode::Local],
            },
            include: vec![],
            exclude: vec![],
        }
    }

    fn macos_custom() -> MatrixCell {
        MatrixCell::new(OsFamily::Macos, "3.9", MpiVariant::Custom, CommsMode::Mpi)
    }

    #[test]
    fn test_cartesian_product() {
        let cells = MatrixExpander::new().expand(&base_spec()).unwrap();
        assert_eq!(cells.len(), 4);

        let unique: HashSet<_> = cells.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_include_adds_cell_outside_product() {
        let mut spec = base_spec();
        spec.include.push(IncludeEntry::from_cell(&macos_custom()));

        let cells = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(&macos_custom()));

        let unique: HashSet<_> = cells.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_disabled_include_is_inert() {
        let mut spec = base_spec();
        let mut entry = IncludeEntry::from_cell(&macos_custom());
        entry.enabled = false;
        spec.include.push(entry);

        let cells = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_include_duplicating_product_cell_is_deduplicated() {
        let mut spec = base_spec();
        spec.include.push(IncludeEntry::from_cell(&MatrixCell::new(
            OsFamily::Linux,
            "3.9",
            MpiVariant::Mpich,
            CommsMode::Mpi,
        )));

        let cells = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_incomplete_include_fails() {
        let mut spec = base_spec();
        spec.include.push(IncludeEntry {
            os: Some(OsFamily::Macos),
            runtime: Some("3.9".to_string()),
            mpi: None,
            comms: Some(CommsMode::Mpi),
            enabled: true,
        });

        let err = MatrixExpander::new().expand(&spec).unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteInclude {
                index: 0,
                attribute: "mpi"
            }
        ));
    }

    #[test]
    fn test_exclude_reduces_product() {
        let mut spec = base_spec();
        spec.exclude.push(ExcludeRule {
            runtime: Some("3.10".to_string()),
            comms: Some(CommsMode::Local),
            ..Default::default()
        });

        let cells = MatrixExpander::new().expand(&spec).unwrap();
        // |product| + |enabled includes| - |excluded| = 4 + 0 - 1
        assert_eq!(cells.len(), 3);
        assert!(!cells.iter().any(|c| c.runtime == "3.10" && c.comms == CommsMode::Local));
    }

    #[test]
    fn test_windows_is_refused() {
        let mut spec = base_spec();
        spec.axes.os.push(OsFamily::Windows);

        let err = MatrixExpander::new().expand(&spec).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_excluded_windows_cells_are_tolerated() {
        let mut spec = base_spec();
        spec.axes.os.push(OsFamily::Windows);
        spec.exclude.push(ExcludeRule {
            os: Some(OsFamily::Windows),
            ..Default::default()
        });

        let cells = MatrixExpander::new().expand(&spec).unwrap();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_duplicate_axis_values_fail() {
        let mut spec = base_spec();
        spec.axes.runtime.push("3.9".to_string());

        let err = MatrixExpander::new().expand(&spec).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
