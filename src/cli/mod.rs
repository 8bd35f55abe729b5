use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "refpack")]
#[command(author, version, about = "Symbol reference indexing and context packs for debugging")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the current directory and print the finished job
    Index {
        /// Only index these files (relative paths)
        #[arg(long = "changed", value_name = "FILE")]
        changed: Vec<String>,

        /// Commit hash recorded on indexed symbols
        #[arg(long)]
        commit: Option<String>,

        /// Reindex everything even if changed files are given
        #[arg(long)]
        full: bool,
    },

    /// Resolve a line range or snippet to a symbol
    Resolve {
        #[arg(long)]
        file: String,

        #[arg(long, requires = "end")]
        start: Option<usize>,

        #[arg(long, requires = "start")]
        end: Option<usize>,

        /// Free text to match semantically
        #[arg(long)]
        snippet: Option<String>,
    },

    /// List references reachable from the symbol at a line
    Refs {
        #[arg(long)]
        file: String,

        #[arg(long)]
        line: usize,

        /// Traversal depth (defaults to references.max_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Maximum entries (defaults to references.max_references)
        #[arg(long)]
        max: Option<usize>,
    },

    /// Build a reference pack for a line range or snippet
    Pack {
        #[arg(long)]
        file: String,

        #[arg(long, requires = "end")]
        start: Option<usize>,

        #[arg(long, requires = "start")]
        end: Option<usize>,

        #[arg(long)]
        snippet: Option<String>,

        /// Token budget (defaults to pack.token_budget)
        #[arg(long)]
        budget: Option<usize>,

        /// Ranking weight overrides, e.g. --weight proximity=0.5
        #[arg(long = "weight", value_name = "NAME=VALUE", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,
    },

    /// Show index counts and metrics
    Stats {
        /// Output in Prometheus format
        #[arg(long)]
        prometheus: bool,
    },
}

fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight '{}': {}", value, e))?;
    Ok((name.trim().to_string(), value))
}
