//! Resolve command implementation.

use anyhow::{bail, Result};

use super::{print_json, Session};

/// Print the symbol a line range or snippet belongs to, or `null`.
pub async fn run(
    file: String,
    start: Option<usize>,
    end: Option<usize>,
    snippet: Option<String>,
) -> Result<()> {
    let line_range = start.zip(end);
    if line_range.is_none() && snippet.is_none() {
        bail!("Provide --start/--end or --snippet");
    }

    let session = Session::indexed().await?;
    let engine = &session.engine;
    let symbol_id = engine
        .resolve_snippet_to_symbol(
            session.project.id,
            &file,
            snippet.as_deref().unwrap_or_default(),
            line_range,
        )
        .await?;

    let symbol = match symbol_id {
        Some(id) => engine.store().get_symbol(id).await?,
        None => None,
    };
    print_json(&serde_json::json!({
        "symbol_id": symbol_id,
        "symbol": symbol,
    }))
}
