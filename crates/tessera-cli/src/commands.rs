//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new pipeline file
    Init,

    /// Validate a pipeline file
    Validate {
        /// Path to pipeline file
        #[arg(default_value = "tessera.yaml")]
        path: String,
    },

    /// Show the expanded matrix for a pipeline
    Matrix {
        /// Path to pipeline file
        path: Option<String>,
    },

    /// Run the pipeline across its matrix
    Run {
        /// Path to pipeline file
        pipeline: Option<String>,

        /// Base branch of the triggering change
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Mark the triggering change as draft (suppresses the run)
        #[arg(long)]
        draft: bool,

        /// Workspace directory (defaults to the current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
}
