//! Index command implementation.

use anyhow::Result;

use super::{print_json, Session};

/// Index the current directory and print the finished job.
///
/// # Arguments
///
/// * `changed` - Restrict indexing to these files unless `full` is set
/// * `commit` - Commit hash recorded on every indexed symbol
/// * `full` - Force a full reindex
pub async fn run(changed: Vec<String>, commit: Option<String>, full: bool) -> Result<()> {
    let changed = (!changed.is_empty()).then_some(changed);
    let (session, job) = Session::open(changed, commit, full).await?;

    let counts = session.engine.store().counts(session.project.id).await?;
    print_json(&serde_json::json!({
        "project": session.project.name,
        "job": job,
        "counts": counts,
    }))
}
