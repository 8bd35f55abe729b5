//! Pack command implementation.

use anyhow::{bail, Result};
use std::collections::HashMap;

use super::{print_json, Session};

/// Resolve a location to a symbol and print its reference pack.
pub async fn run(
    file: String,
    start: Option<usize>,
    end: Option<usize>,
    snippet: Option<String>,
    budget: Option<usize>,
    weights: Vec<(String, f64)>,
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
    let Some(symbol_id) = symbol_id else {
        return print_json(&serde_json::Value::Null);
    };

    let params: HashMap<String, f64> = weights.into_iter().collect();
    let pack = engine
        .build_reference_pack(
            symbol_id,
            budget.unwrap_or(session.config.pack.token_budget),
            (!params.is_empty()).then_some(&params),
        )
        .await?;
    print_json(&pack)
}
