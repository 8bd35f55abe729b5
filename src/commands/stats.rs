//! Stats command for displaying index counts and metrics

use anyhow::Result;

use super::{print_json, Session};
use crate::metrics::{gather_metrics, MetricSnapshot};

/// Index the current directory, then print store counts and a metric
/// snapshot, or the raw Prometheus exposition with `prometheus`.
pub async fn run(prometheus: bool) -> Result<()> {
    let session = Session::indexed().await?;

    if prometheus {
        print!("{}", gather_metrics());
        return Ok(());
    }

    let counts = session.engine.store().counts(session.project.id).await?;
    print_json(&serde_json::json!({
        "project": session.project.name,
        "counts": counts,
        "metrics": MetricSnapshot::capture(),
    }))
}
