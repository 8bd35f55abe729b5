//! Refs command implementation.

use anyhow::Result;

use super::{print_json, Session};

/// Print the references reachable from the symbol enclosing `line`.
pub async fn run(file: String, line: usize, depth: Option<usize>, max: Option<usize>) -> Result<()> {
    let session = Session::indexed().await?;
    let engine = &session.engine;

    let enclosing = engine
        .find_enclosing_symbol(session.project.id, &file, Some(line), None, None)
        .await?;
    let Some(symbol_id) = enclosing.as_ref().and_then(|s| s.id()) else {
        return print_json(&serde_json::json!({ "symbol": null, "references": [] }));
    };

    let references = engine
        .get_symbol_references(
            symbol_id,
            depth.unwrap_or(session.config.references.max_depth),
            max.unwrap_or(session.config.references.max_references),
        )
        .await?;
    print_json(&serde_json::json!({
        "symbol": enclosing,
        "references": references,
    }))
}
