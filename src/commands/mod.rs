//! CLI command implementations.
//!
//! Every command works on an in-process index of the current directory and
//! prints JSON to stdout.

pub mod index;
pub mod pack;
pub mod refs;
pub mod resolve;
pub mod stats;

use anyhow::{Context, Result};
use serde::Serialize;
use std::env;

use crate::config::Config;
use crate::engine::{EngineContext, ReferenceEngine};
use crate::indexing::IndexingJob;
use crate::symbol::Project;

/// An indexed project ready for queries.
pub(crate) struct Session {
    pub engine: ReferenceEngine,
    pub project: Project,
    pub config: Config,
}

impl Session {
    /// Register the current directory and run an indexing job over it.
    pub(crate) async fn open(
        changed_files: Option<Vec<String>>,
        commit_hash: Option<String>,
        force_full_reindex: bool,
    ) -> Result<(Self, IndexingJob)> {
        let root = env::current_dir().context("Failed to determine current directory")?;
        let config = Config::load(&root)?;
        let engine = ReferenceEngine::new(EngineContext::local(&root, config.clone())?);

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        let project = engine.store().create_project(&name, &root).await?;

        let ticket = engine
            .index_project_symbols(project.id, changed_files, commit_hash, force_full_reindex)
            .await?;
        let job = ticket.wait().await?;

        Ok((
            Self {
                engine,
                project,
                config,
            },
            job,
        ))
    }

    /// Fully indexed session for query commands.
    pub(crate) async fn indexed() -> Result<Self> {
        let (session, _) = Self::open(None, None, true).await?;
        Ok(session)
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
