use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".refpack";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub ranking: RankingConfig,

    #[serde(default)]
    pub references: ReferencesConfig,

    #[serde(default)]
    pub pack: PackConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// File extensions recognized as code
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Path components to skip (in addition to .gitignore)
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Files per batch; stats are persisted after each one
    #[serde(default = "default_file_batch_size")]
    pub batch_size: usize,

    /// Embed commit history at the end of a full reindex
    #[serde(default = "default_true")]
    pub index_commit_history: bool,

    #[serde(default = "default_max_commit_history")]
    pub max_commit_history: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_patterns: default_ignore_patterns(),
            batch_size: default_file_batch_size(),
            index_commit_history: true,
            max_commit_history: default_max_commit_history(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    [
        "py", "js", "jsx", "mjs", "cjs", "ts", "tsx", "java", "cpp", "cc", "cxx", "h", "hpp",
        "hh", "hxx", "go", "rs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "node_modules".to_string(),
        "target".to_string(),
        ".git".to_string(),
        "dist".to_string(),
        "build".to_string(),
        "__pycache__".to_string(),
        ".venv".to_string(),
        "vendor".to_string(),
        CONFIG_DIR.to_string(),
    ]
}

fn default_file_batch_size() -> usize {
    50
}

fn default_max_commit_history() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic hashed bag-of-words, no model download
    #[default]
    Mock,
    /// Local ONNX model, requires the `fastembed` feature
    Fastembed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

/// Weights and constants of the reference ranking formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_semantic_weight")]
    pub semantic_similarity: f64,

    #[serde(default = "default_proximity_weight")]
    pub proximity: f64,

    #[serde(default = "default_recency_weight")]
    pub recency: f64,

    #[serde(default = "default_usage_weight")]
    pub usage: f64,

    /// Applied multiplicatively to candidates in test files
    #[serde(default = "default_test_multiplier")]
    pub test_multiplier: f64,

    /// Decay rate per day of `exp(-lambda * days)`
    #[serde(default = "default_recency_lambda")]
    pub recency_lambda: f64,

    /// Distance assumed when a candidate's call distance is unknown
    #[serde(default = "default_call_distance")]
    pub default_call_distance: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            semantic_similarity: default_semantic_weight(),
            proximity: default_proximity_weight(),
            recency: default_recency_weight(),
            usage: default_usage_weight(),
            test_multiplier: default_test_multiplier(),
            recency_lambda: default_recency_lambda(),
            default_call_distance: default_call_distance(),
        }
    }
}

impl RankingConfig {
    /// Copy with any entries of `params` overriding the matching weight.
    ///
    /// Recognized keys are `semantic_similarity`, `proximity`, `recency`,
    /// `usage`, `test_boost` and `recency_lambda`; others are ignored.
    pub fn with_overrides(&self, params: &HashMap<String, f64>) -> Self {
        let mut merged = self.clone();
        for (key, value) in params {
            match key.as_str() {
                "semantic_similarity" => merged.semantic_similarity = *value,
                "proximity" => merged.proximity = *value,
                "recency" => merged.recency = *value,
                "usage" => merged.usage = *value,
                "test_boost" | "test_multiplier" => merged.test_multiplier = *value,
                "recency_lambda" => merged.recency_lambda = *value,
                _ => {}
            }
        }
        merged
    }
}

fn default_semantic_weight() -> f64 {
    0.60
}

fn default_proximity_weight() -> f64 {
    0.20
}

fn default_recency_weight() -> f64 {
    0.10
}

fn default_usage_weight() -> f64 {
    0.08
}

fn default_test_multiplier() -> f64 {
    1.2
}

fn default_recency_lambda() -> f64 {
    0.1
}

fn default_call_distance() -> u32 {
    2
}

/// Defaults for `get_symbol_references`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencesConfig {
    #[serde(default = "default_reference_depth")]
    pub max_depth: usize,

    #[serde(default = "default_max_references")]
    pub max_references: usize,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        Self {
            max_depth: default_reference_depth(),
            max_references: default_max_references(),
        }
    }
}

fn default_reference_depth() -> usize {
    1
}

fn default_max_references() -> usize {
    50
}

/// Order in which pack candidates are offered to the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackSelection {
    /// Reference graph traversal order
    #[default]
    Traversal,
    /// Descending ranking score
    Ranked,
}

impl std::fmt::Display for PackSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traversal => write!(f, "traversal"),
            Self::Ranked => write!(f, "ranked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackConfig {
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    #[serde(default = "default_pack_depth")]
    pub reference_depth: usize,

    #[serde(default = "default_max_references")]
    pub max_references: usize,

    /// Lines of context either side of a reference line
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,

    #[serde(default)]
    pub selection: PackSelection,

    #[serde(default = "default_historical_fix_limit")]
    pub historical_fix_limit: usize,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            reference_depth: default_pack_depth(),
            max_references: default_max_references(),
            context_radius: default_context_radius(),
            selection: PackSelection::default(),
            historical_fix_limit: default_historical_fix_limit(),
        }
    }
}

fn default_token_budget() -> usize {
    4000
}

fn default_pack_depth() -> usize {
    2
}

fn default_context_radius() -> usize {
    5
}

fn default_historical_fix_limit() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,

    /// Multiplier on `top_k` when results are filtered to one file
    #[serde(default = "default_file_filter_overfetch")]
    pub file_filter_overfetch: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            semantic_top_k: default_semantic_top_k(),
            file_filter_overfetch: default_file_filter_overfetch(),
        }
    }
}

fn default_semantic_top_k() -> usize {
    10
}

fn default_file_filter_overfetch() -> usize {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// A processing job without a heartbeat for this long is reaped
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

fn default_lease_ttl_secs() -> u64 {
    900
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write logs to rolling files
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also log to stderr
    #[serde(default)]
    pub stderr: bool,

    #[serde(default = "default_log_level")]
    pub level: String,

    /// Relative paths resolve against the project root
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// hourly, daily, minutely or never
    #[serde(default = "default_log_rotation")]
    pub rotation: String,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stderr: false,
            level: default_log_level(),
            directory: default_log_directory(),
            rotation: default_log_rotation(),
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("logs")
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

fn default_log_file_prefix() -> String {
    "refpack.log".to_string()
}

impl Config {
    /// Load configuration from the .refpack directory
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = Self::config_dir(root).join(CONFIG_FILE);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", config_path))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to the .refpack directory
    pub fn save(&self, root: &Path) -> Result<()> {
        let config_dir = Self::config_dir(root);
        let config_path = config_dir.join(CONFIG_FILE);

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    pub fn config_dir(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR)
    }
}
