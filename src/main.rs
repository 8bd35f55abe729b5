use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use refpack::cli::{Cli, Commands};
use refpack::config::Config;
use refpack::logging::{init_early_logging, init_logging};
use refpack::metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    // Held until exit so buffered log lines are flushed
    let _logging_guard = match Config::load(&project_root) {
        Ok(config) => Some(init_logging(&config.logging, &project_root)?),
        Err(e) => {
            init_early_logging();
            tracing::warn!("Unreadable configuration: {:#}", e);
            None
        }
    };

    tracing::info!("refpack starting in {}", project_root.display());
    metrics::register_metrics();

    match cli.command {
        Commands::Index {
            changed,
            commit,
            full,
        } => {
            refpack::commands::index::run(changed, commit, full).await?;
        }
        Commands::Resolve {
            file,
            start,
            end,
            snippet,
        } => {
            refpack::commands::resolve::run(file, start, end, snippet).await?;
        }
        Commands::Refs {
            file,
            line,
            depth,
            max,
        } => {
            refpack::commands::refs::run(file, line, depth, max).await?;
        }
        Commands::Pack {
            file,
            start,
            end,
            snippet,
            budget,
            weights,
        } => {
            refpack::commands::pack::run(file, start, end, snippet, budget, weights).await?;
        }
        Commands::Stats { prometheus } => {
            refpack::commands::stats::run(prometheus).await?;
        }
    }

    Ok(())
}
