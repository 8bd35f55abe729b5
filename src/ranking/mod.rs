//! Multi-factor scoring of reference candidates.
//!
//! `composite = (w_sem * semantic + w_prox * proximity + w_rec * recency
//! + w_use * usage) * test_multiplier`. Weights are a tunable linear
//! combination and are not normalized.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::RankingConfig;
use crate::search::cosine_similarity;

/// Score used when a factor's input is missing.
const NEUTRAL: f64 = 0.5;

const TEST_INDICATORS: [&str; 3] = ["test", "spec", "testing"];

/// Whether a path looks like test code.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    TEST_INDICATORS.iter().any(|t| lower.contains(t))
}

/// Inputs the engine scores a candidate on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingFeatures {
    pub embedding: Option<Vec<f32>>,
    /// Hops from the anchor symbol, if known
    pub call_distance: Option<u32>,
    pub last_modified: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub file_path: String,
}

/// Per-factor values behind a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorScores {
    pub semantic_similarity: f64,
    pub proximity: f64,
    pub recency: f64,
    pub usage: f64,
    pub test_multiplier: f64,
}

/// A candidate annotated with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
    pub factors: FactorScores,
}

#[derive(Debug, Clone)]
pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Engine with `params` overriding the configured weights.
    pub fn with_params(&self, params: Option<&HashMap<String, f64>>) -> Self {
        match params {
            Some(params) => Self::new(self.config.with_overrides(params)),
            None => self.clone(),
        }
    }

    pub fn factors(
        &self,
        query: Option<&[f32]>,
        features: &RankingFeatures,
        now: DateTime<Utc>,
    ) -> FactorScores {
        FactorScores {
            semantic_similarity: semantic_score(query, features.embedding.as_deref()),
            proximity: self.proximity_score(features.call_distance),
            recency: self.recency_score(features.last_modified, now),
            usage: usage_score(features.usage_count),
            test_multiplier: if is_test_path(&features.file_path) {
                self.config.test_multiplier
            } else {
                1.0
            },
        }
    }

    pub fn composite(&self, factors: &FactorScores) -> f64 {
        let c = &self.config;
        let weighted = c.semantic_similarity * factors.semantic_similarity
            + c.proximity * factors.proximity
            + c.recency * factors.recency
            + c.usage * factors.usage;
        weighted * factors.test_multiplier
    }

    pub fn score(&self, query: Option<&[f32]>, features: &RankingFeatures, now: DateTime<Utc>) -> f64 {
        self.composite(&self.factors(query, features, now))
    }

    /// Score every candidate and sort by descending score. Ties keep their
    /// input order.
    pub fn rank_at<T>(
        &self,
        query: Option<&[f32]>,
        candidates: Vec<(T, RankingFeatures)>,
        now: DateTime<Utc>,
    ) -> Vec<Scored<T>> {
        let mut scored: Vec<Scored<T>> = candidates
            .into_iter()
            .map(|(item, features)| {
                let factors = self.factors(query, &features, now);
                Scored {
                    item,
                    score: self.composite(&factors),
                    factors,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    pub fn rank<T>(&self, query: Option<&[f32]>, candidates: Vec<(T, RankingFeatures)>) -> Vec<Scored<T>> {
        self.rank_at(query, candidates, Utc::now())
    }

    fn proximity_score(&self, call_distance: Option<u32>) -> f64 {
        let distance = call_distance.unwrap_or(self.config.default_call_distance);
        1.0 / (1.0 + f64::from(distance))
    }

    fn recency_score(&self, last_modified: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
        match last_modified {
            Some(at) => {
                let days = (now - at).num_days().max(0) as f64;
                (-self.config.recency_lambda * days).exp()
            }
            None => NEUTRAL,
        }
    }
}

fn semantic_score(query: Option<&[f32]>, candidate: Option<&[f32]>) -> f64 {
    let (Some(query), Some(candidate)) = (query, candidate) else {
        return NEUTRAL;
    };
    if query.is_empty() || query.len() != candidate.len() {
        return NEUTRAL;
    }
    // Same shape but a zero vector: nothing in common.
    cosine_similarity(query, candidate).map_or(0.0, f64::from)
}

/// Log-scaled and deliberately unbounded.
fn usage_score(usage_count: u64) -> f64 {
    (1.0 + usage_count as f64).ln() / 10.0
}
