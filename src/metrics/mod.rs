//! Prometheus metrics for indexing, embedding, resolution and pack building.

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use serde::Serialize;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Indexing jobs

    pub static ref JOBS_STARTED: Counter = Counter::with_opts(
        Opts::new("refpack_indexing_jobs_started_total", "Indexing jobs started")
    ).expect("Failed to create JOBS_STARTED counter");

    pub static ref JOBS_COMPLETED: Counter = Counter::with_opts(
        Opts::new("refpack_indexing_jobs_completed_total", "Indexing jobs completed")
    ).expect("Failed to create JOBS_COMPLETED counter");

    pub static ref JOBS_FAILED: Counter = Counter::with_opts(
        Opts::new("refpack_indexing_jobs_failed_total", "Indexing jobs failed or reaped")
    ).expect("Failed to create JOBS_FAILED counter");

    pub static ref FILES_INDEXED: Counter = Counter::with_opts(
        Opts::new("refpack_files_indexed_total", "Files run through the extractor")
    ).expect("Failed to create FILES_INDEXED counter");

    pub static ref SYMBOLS_INDEXED: Counter = Counter::with_opts(
        Opts::new("refpack_symbols_indexed_total", "Symbols upserted")
    ).expect("Failed to create SYMBOLS_INDEXED counter");

    pub static ref REFERENCES_INDEXED: Counter = Counter::with_opts(
        Opts::new("refpack_references_indexed_total", "References written")
    ).expect("Failed to create REFERENCES_INDEXED counter");

    pub static ref EXTRACTION_ERRORS: Counter = Counter::with_opts(
        Opts::new("refpack_extraction_errors_total", "Per-file extraction or store faults")
    ).expect("Failed to create EXTRACTION_ERRORS counter");

    /// Wall time of one indexing job in seconds
    pub static ref INDEX_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("refpack_indexing_duration_seconds", "Indexing job duration in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0])
    ).expect("Failed to create INDEX_LATENCY histogram");

    // Embeddings

    pub static ref EMBEDDING_REQUESTS: Counter = Counter::with_opts(
        Opts::new("refpack_embedding_requests_total", "Embedding generation requests")
    ).expect("Failed to create EMBEDDING_REQUESTS counter");

    pub static ref EMBEDDING_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("refpack_embedding_latency_seconds", "Embedding generation latency in seconds")
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0])
    ).expect("Failed to create EMBEDDING_LATENCY histogram");

    // Retrieval

    pub static ref RESOLUTIONS: Counter = Counter::with_opts(
        Opts::new("refpack_resolutions_total", "Snippet resolution requests")
    ).expect("Failed to create RESOLUTIONS counter");

    pub static ref SEMANTIC_FALLBACKS: Counter = Counter::with_opts(
        Opts::new("refpack_semantic_fallbacks_total", "Resolutions answered by semantic search")
    ).expect("Failed to create SEMANTIC_FALLBACKS counter");

    pub static ref PACKS_BUILT: Counter = Counter::with_opts(
        Opts::new("refpack_packs_built_total", "Reference packs built")
    ).expect("Failed to create PACKS_BUILT counter");

    /// Token estimate of each built pack
    pub static ref PACK_TOKENS: Histogram = Histogram::with_opts(
        HistogramOpts::new("refpack_pack_tokens", "Token estimate of built reference packs")
            .buckets(vec![100.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0])
    ).expect("Failed to create PACK_TOKENS histogram");
}

fn collectors() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(JOBS_STARTED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        Box::new(FILES_INDEXED.clone()),
        Box::new(SYMBOLS_INDEXED.clone()),
        Box::new(REFERENCES_INDEXED.clone()),
        Box::new(EXTRACTION_ERRORS.clone()),
        Box::new(INDEX_LATENCY.clone()),
        Box::new(EMBEDDING_REQUESTS.clone()),
        Box::new(EMBEDDING_LATENCY.clone()),
        Box::new(RESOLUTIONS.clone()),
        Box::new(SEMANTIC_FALLBACKS.clone()),
        Box::new(PACKS_BUILT.clone()),
        Box::new(PACK_TOKENS.clone()),
    ]
}

/// Register every metric with [`REGISTRY`]. Calling it again is harmless.
pub fn register_metrics() {
    for collector in collectors() {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => tracing::warn!("Failed to register metric: {}", e),
        }
    }
}

/// Registered metrics in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics contained invalid UTF-8: {}", e);
        String::new()
    })
}

/// Point-in-time values for the `stats` command.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSnapshot {
    pub jobs_started: f64,
    pub jobs_completed: f64,
    pub jobs_failed: f64,
    pub files_indexed: f64,
    pub symbols_indexed: f64,
    pub references_indexed: f64,
    pub extraction_errors: f64,
    pub embedding_requests: f64,
    pub embedding_latency_avg: f64,
    pub packs_built: f64,
    pub pack_tokens_avg: f64,
}

impl MetricSnapshot {
    pub fn capture() -> Self {
        Self {
            jobs_started: JOBS_STARTED.get(),
            jobs_completed: JOBS_COMPLETED.get(),
            jobs_failed: JOBS_FAILED.get(),
            files_indexed: FILES_INDEXED.get(),
            symbols_indexed: SYMBOLS_INDEXED.get(),
            references_indexed: REFERENCES_INDEXED.get(),
            extraction_errors: EXTRACTION_ERRORS.get(),
            embedding_requests: EMBEDDING_REQUESTS.get(),
            embedding_latency_avg: histogram_avg(&EMBEDDING_LATENCY),
            packs_built: PACKS_BUILT.get(),
            pack_tokens_avg: histogram_avg(&PACK_TOKENS),
        }
    }
}

fn histogram_avg(histogram: &Histogram) -> f64 {
    let count = histogram.get_sample_count();
    if count == 0 {
        return 0.0;
    }
    histogram.get_sample_sum() / count as f64
}
