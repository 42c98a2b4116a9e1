//! Tessera CLI entrypoint.

use clap::Parser;
use std::process::ExitCode;

mod commands;
mod handlers;

use commands::Commands;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about = "Tessera matrix CI orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => handlers::init().await,
        Commands::Validate { path } => handlers::validate(&path).await,
        Commands::Matrix { path } => handlers::show_matrix(path.as_deref()).await,
        Commands::Run {
            pipeline,
            branch,
            draft,
            workspace,
        } => handlers::run(pipeline, branch, draft, workspace).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", console::style("✗").red().bold(), e);
            // Configuration problems abort before anything is scheduled.
            ExitCode::from(2)
        }
    }
}
