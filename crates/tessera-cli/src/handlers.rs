//! Command handlers.

use console::style;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tessera_cache::FilesystemStore;
use tessera_core::events::Event;
use tessera_core::job::JobStatus;
use tessera_core::pipeline::PipelineSpec;
use tessera_core::ports::{CoverageReporter, EventBus};
use tessera_coverage::{HttpReporter, NullReporter};
use tessera_runner::{OutputLine, ShellExecutor};
use tessera_scheduler::{ChangeEvent, MatrixExpander, MemoryEventBus, Orchestrator};

type HandlerResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Initialize a new pipeline file.
pub async fn init() -> HandlerResult {
    let path = Path::new("tessera.yaml");

    if path.exists() {
        println!("{} tessera.yaml already exists", style("!").yellow());
        return Ok(ExitCode::SUCCESS);
    }

    let template = r#"name: matrix-tests
ref: main

matrix:
  axes:
    os: [linux]
    runtime: ["3.10", "3.11"]
    mpi: [mpich]
    comms: [m, l]
  include:
    - os: macos
      runtime: "3.10"
      mpi: custom
      comms: m
      enabled: false

cache:
  paths:
    - deps

install:
  - name: bootstrap environment
    run: ./ci/setup-env.sh
  - name: install mpi
    when: { mpi: mpich }
    run: ./ci/install-mpich.sh
  - name: build bindings from source
    when:
      all: [{ comms: m }, cache-miss]
    run: ./ci/build-bindings.sh

test:
  linux: ./ci/run-tests.sh
  macos: ./ci/run-tests.sh --macos

coverage:
  report: coverage/combined.cov
"#;

    std::fs::write(path, template)?;
    println!("{} Created tessera.yaml", style("✓").green());
    Ok(ExitCode::SUCCESS)
}

/// Validate a pipeline file.
pub async fn validate(path: &str) -> HandlerResult {
    let spec = load_pipeline(Path::new(path))?;
    spec.validate()?;
    let cells = MatrixExpander::new().expand(&spec.matrix)?;

    println!(
        "{} Pipeline \"{}\" is valid",
        style("✓").green(),
        spec.name
    );
    println!("  Cells: {}", cells.len());
    println!("  Install actions: {}", spec.install.len());
    Ok(ExitCode::SUCCESS)
}

/// Print the expanded matrix.
pub async fn show_matrix(path: Option<&str>) -> HandlerResult {
    let file = find_pipeline_file(path)
        .ok_or("no pipeline file found (expected tessera.yaml)")?;
    let spec = load_pipeline(&file)?;
    let cells = MatrixExpander::new().expand(&spec.matrix)?;

    println!("{} cells:", cells.len());
    for cell in &cells {
        println!("  {}", cell);
    }
    Ok(ExitCode::SUCCESS)
}

/// Run the pipeline across its matrix.
pub async fn run(
    pipeline: Option<String>,
    branch: String,
    draft: bool,
    workspace: Option<PathBuf>,
) -> HandlerResult {
    let file = find_pipeline_file(pipeline.as_deref())
        .ok_or("no pipeline file found (expected tessera.yaml)")?;
    let spec = load_pipeline(&file)?;
    let workspace = match workspace {
        Some(w) => w,
        None => std::env::current_dir()?,
    };

    println!(
        "\n{} Running pipeline: {}",
        style("▶").cyan().bold(),
        style(&spec.name).bold()
    );

    let cache_root = match &spec.cache.root {
        Some(root) if root.is_absolute() => root.clone(),
        Some(root) => workspace.join(root),
        None => workspace.join(".tessera/cache"),
    };
    let store = Arc::new(FilesystemStore::new(cache_root));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<OutputLine>(100);
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("      {}", style(&line.content).dim());
        }
    });

    let executor = Arc::new(ShellExecutor::with_output(tx));
    let reporter: Arc<dyn CoverageReporter> = match &spec.coverage.service_url {
        Some(url) => Arc::new(HttpReporter::new(url.clone())),
        None => Arc::new(NullReporter),
    };
    let bus = Arc::new(MemoryEventBus::default());

    let mut events = bus.subscribe().await?;
    let lifecycle = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Event::CellStarted(p) => {
                    println!("{} Cell: {}", style("━━▶").cyan(), style(&p.cell).bold());
                }
                Event::CacheHit(p) => {
                    println!("    {} cache hit ({})", style("⛁").green(), p.key);
                }
                Event::CacheMiss(p) => {
                    println!("    {} cache miss ({})", style("⛁").yellow(), p.key);
                }
                Event::InstallFailed(p) => {
                    println!(
                        "    {} install action `{}` failed (exit {})",
                        style("✗").red(),
                        p.action,
                        p.exit_code
                    );
                }
                _ => {}
            }
        }
    });

    let event = if draft {
        ChangeEvent::draft(branch)
    } else {
        ChangeEvent::ready(branch)
    };

    let orchestrator = Orchestrator::new(store, executor, reporter, bus.clone());
    let summary = orchestrator.execute(&event, &spec, &workspace).await?;

    printer.abort();
    lifecycle.abort();

    println!();
    if !summary.admitted {
        println!(
            "{} Run suppressed: change is a draft, zero cells scheduled",
            style("⏭").dim()
        );
        return Ok(ExitCode::SUCCESS);
    }

    for result in &summary.results {
        match result.status {
            JobStatus::Success => {
                println!(
                    "  {} {} ({:.2}s)",
                    style("✓").green(),
                    result.cell,
                    result.duration_ms as f64 / 1000.0
                );
            }
            JobStatus::Failure => {
                println!(
                    "  {} {} (exit code {})",
                    style("✗").red(),
                    result.cell,
                    result.exit_code.unwrap_or(-1)
                );
            }
            _ => {
                println!("  {} {} (skipped)", style("⏭").dim(), result.cell);
            }
        }
    }

    match (&summary.report, &summary.merge_error) {
        (Some(report), _) => {
            println!(
                "\n{} Coverage merged: {} artifacts, {} missing → {}",
                style("✓").green(),
                report.merged,
                report.missing,
                report.report_path.display()
            );
        }
        (None, Some(e)) => {
            println!("\n{} Coverage merge failed: {}", style("✗").red(), e);
        }
        _ => {}
    }

    println!();
    if summary.is_success() {
        println!(
            "{} Pipeline completed successfully in {:.2}s",
            style("✓").green().bold(),
            summary.duration_ms as f64 / 1000.0
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} Pipeline failed after {:.2}s ({} of {} cells failed)",
            style("✗").red().bold(),
            summary.duration_ms as f64 / 1000.0,
            summary.failed_cells(),
            summary.results.len()
        );
        Ok(ExitCode::from(1))
    }
}

/// Find the pipeline file in standard locations.
pub fn find_pipeline_file(path: Option<&str>) -> Option<PathBuf> {
    if let Some(p) = path {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
        return None;
    }

    let candidates = [
        "tessera.yaml",
        "tessera.yml",
        ".tessera/pipeline.yaml",
        ".tessera/pipeline.yml",
    ];

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

/// Load and parse a pipeline file.
pub fn load_pipeline(path: &Path) -> Result<PipelineSpec, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let spec: PipelineSpec = serde_yaml::from_str(&content)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::cell::{CommsMode, MpiVariant, OsFamily};

    #[test]
    fn test_init_template_parses_and_validates() {
        // The shipped template must stay loadable.
        let template = r#"
name: matrix-tests
ref: main
matrix:
  axes:
    os: [linux]
    runtime: ["3.10", "3.11"]
    comms: [m, l]
  include:
    - os: macos
      runtime: "3.10"
      mpi: custom
      comms: m
      enabled: false
install:
  - name: build bindings from source
    when:
      all: [{ comms: m }, cache-miss]
    run: ./ci/build-bindings.sh
test:
  linux: ./ci/run-tests.sh
  macos: ./ci/run-tests.sh --macos
"#;
        let spec: PipelineSpec = serde_yaml::from_str(template).unwrap();
        spec.validate().unwrap();
        assert_eq!(spec.git_ref, "main");
        assert_eq!(spec.matrix.include.len(), 1);
        assert!(!spec.matrix.include[0].enabled);

        let cells = MatrixExpander::new().expand(&spec.matrix).unwrap();
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_pipeline_yaml_cell_attributes() {
        let yaml = r#"
name: t
ref: develop
matrix:
  axes:
    os: [linux, macos]
    runtime: ["3.9"]
    mpi: [mpich, openmpi]
    comms: [t]
test:
  linux: make test
  macos: make test
"#;
        let spec: PipelineSpec = serde_yaml::from_str(yaml).unwrap();
        let cells = MatrixExpander::new().expand(&spec.matrix).unwrap();
        assert_eq!(cells.len(), 4);
        assert!(cells.iter().all(|c| c.comms == CommsMode::Tcp));
        assert!(cells.iter().any(|c| c.os == OsFamily::Macos
            && c.mpi == MpiVariant::Openmpi));
    }

    #[test]
    fn test_find_pipeline_file_explicit_missing() {
        assert!(find_pipeline_file(Some("/definitely/not/here.yaml")).is_none());
    }
}
