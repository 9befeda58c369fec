use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

/// Parse a profiled env var, falling back to `default` when unset.
/// A value that is set but unparsable is a configuration error.
fn profiled_env_parse<T: FromStr>(
    profile: &str,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match profiled_env_opt(profile, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse {raw:?}"))),
    }
}

fn profiled_env_bool(profile: &str, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match profiled_env_opt(profile, key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::invalid(key, format!("not a boolean: {v:?}"))),
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SEMCHUNK_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("SEMCHUNK_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let config = Self {
            profile: p.to_string(),
            chunking: ChunkingConfig::from_env_profiled(p)?,
            embedding: EmbeddingConfig::from_env_profiled(p)?,
            cache: CacheConfig::from_env_profiled(p)?,
        };
        config.chunking.validate()?;
        config.embedding.validate()?;
        Ok(config)
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let c = &self.chunking;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  chunking:    strategy={:?}, unit={:?}, max={}, min={}, overlap={}, cohesion={:?}>{}",
            c.strategy,
            c.size_unit,
            c.max_chunk_size,
            c.min_chunk_size,
            c.overlap_budget,
            c.cohesion_measure,
            c.cohesion_drop_threshold
        );
        tracing::info!(
            "  presplit:    target={}, overlap={}",
            c.presplit_chunk_size,
            c.presplit_overlap
        );
        tracing::info!(
            "  embedding:   provider={}, model={}, dims={}, batch={}, key={}",
            self.embedding.provider,
            self.embedding.model,
            self.embedding.dimensions,
            self.embedding.batch_size,
            if self.embedding.api_key.is_some() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  cache:       dir={}, memory_entries={}",
            self.cache.directory.display(),
            self.cache.memory_entries
        );
    }
}

// ── Chunking ──────────────────────────────────────────────────

/// Unit used to measure sentence and chunk sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeUnit {
    Chars,
    Tokens,
}

impl FromStr for SizeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chars" | "characters" | "char" => Ok(Self::Chars),
            "tokens" | "token" => Ok(Self::Tokens),
            other => Err(ConfigError::Unknown {
                kind: "size unit",
                value: other.to_string(),
            }),
        }
    }
}

/// Which sub-chunking algorithm splits oversized sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    SizeAndCohesion,
    TokenBudgetOnly,
    BreakpointPercentile,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "size_and_cohesion" | "cohesion" | "greedy" => Ok(Self::SizeAndCohesion),
            "token_budget" | "token_budget_only" | "budget" => Ok(Self::TokenBudgetOnly),
            "breakpoint" | "breakpoint_percentile" | "semantic" => Ok(Self::BreakpointPercentile),
            other => Err(ConfigError::Unknown {
                kind: "chunking strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// How the cohesion drop of admitting a sentence into a chunk is measured.
///
/// `Delta` is `cos(centroid, v) - cos(new_centroid, v)`. The new centroid
/// always moves toward `v`, so this is never positive: under `Delta` chunks are
/// cut on size alone. `Distance` is `1 - cos(new_centroid, v)`, which grows as
/// `v` departs from the chunk topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohesionMeasure {
    Delta,
    Distance,
}

impl FromStr for CohesionMeasure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delta" | "similarity_delta" => Ok(Self::Delta),
            "distance" | "cosine_distance" => Ok(Self::Distance),
            other => Err(ConfigError::Unknown {
                kind: "cohesion measure",
                value: other.to_string(),
            }),
        }
    }
}

/// Statistic used to derive the breakpoint threshold from window distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointType {
    Percentile,
    StandardDeviation,
    Interquartile,
}

impl BreakpointType {
    pub fn default_amount(self) -> f32 {
        match self {
            Self::Percentile => 95.0,
            Self::StandardDeviation => 3.0,
            Self::Interquartile => 1.5,
        }
    }
}

impl FromStr for BreakpointType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "percentile" => Ok(Self::Percentile),
            "standard_deviation" | "stddev" => Ok(Self::StandardDeviation),
            "interquartile" | "iqr" => Ok(Self::Interquartile),
            other => Err(ConfigError::Unknown {
                kind: "breakpoint type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: StrategyKind,
    pub size_unit: SizeUnit,
    /// Hard ceiling per chunk.
    pub max_chunk_size: usize,
    /// Chunks below this size are merged into a neighbour.
    pub min_chunk_size: usize,
    /// Trailing content repeated at the start of the next sub-chunk.
    pub overlap_budget: usize,
    pub cohesion_drop_threshold: f32,
    pub cohesion_measure: CohesionMeasure,
    /// Target block size for the structural fallback splitter (characters).
    pub presplit_chunk_size: usize,
    pub presplit_overlap: usize,
    /// Neighbours on each side pooled into a breakpoint window.
    pub breakpoint_buffer_size: usize,
    pub breakpoint_type: BreakpointType,
    /// `None` uses the default amount for `breakpoint_type`.
    pub breakpoint_amount: Option<f32>,
    /// Discard sections whose only content is shorter than `min_chunk_size`.
    pub drop_short_sections: bool,
    /// Word list for the Thai dictionary segmenter.
    pub thai_dictionary: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::SizeAndCohesion,
            size_unit: SizeUnit::Chars,
            max_chunk_size: 3000,
            min_chunk_size: 700,
            overlap_budget: 300,
            cohesion_drop_threshold: 0.12,
            cohesion_measure: CohesionMeasure::Delta,
            presplit_chunk_size: 3000,
            presplit_overlap: 0,
            breakpoint_buffer_size: 1,
            breakpoint_type: BreakpointType::Percentile,
            breakpoint_amount: None,
            drop_short_sections: true,
            thai_dictionary: None,
        }
    }
}

impl ChunkingConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let d = Self::default();
        let breakpoint_amount = match profiled_env_opt(p, "SEMANTIC_BREAKPOINT_AMOUNT") {
            None => None,
            Some(v) if v.eq_ignore_ascii_case("auto") => None,
            Some(v) => Some(v.parse().map_err(|_| {
                ConfigError::invalid("SEMANTIC_BREAKPOINT_AMOUNT", format!("cannot parse {v:?}"))
            })?),
        };
        Ok(Self {
            strategy: profiled_env_or(p, "CHUNK_STRATEGY", "size_and_cohesion").parse()?,
            size_unit: profiled_env_or(p, "SIZE_UNIT", "chars").parse()?,
            max_chunk_size: profiled_env_parse(p, "MAX_CHARS", d.max_chunk_size)?,
            min_chunk_size: profiled_env_parse(p, "MIN_CHARS", d.min_chunk_size)?,
            overlap_budget: profiled_env_parse(p, "OVERLAP_CHARS", d.overlap_budget)?,
            cohesion_drop_threshold: profiled_env_parse(
                p,
                "COHESION_DROP",
                d.cohesion_drop_threshold,
            )?,
            cohesion_measure: profiled_env_or(p, "COHESION_MEASURE", "delta").parse()?,
            presplit_chunk_size: profiled_env_parse(p, "PRESPLIT_CHARS", d.presplit_chunk_size)?,
            presplit_overlap: profiled_env_parse(p, "PRESPLIT_OVERLAP_CHARS", d.presplit_overlap)?,
            breakpoint_buffer_size: profiled_env_parse(
                p,
                "SEMANTIC_BUFFER_SIZE",
                d.breakpoint_buffer_size,
            )?,
            breakpoint_type: profiled_env_or(p, "SEMANTIC_BREAKPOINT_TYPE", "percentile").parse()?,
            breakpoint_amount,
            drop_short_sections: profiled_env_bool(p, "DROP_SHORT_SECTIONS", d.drop_short_sections)?,
            thai_dictionary: profiled_env_opt(p, "THAI_DICTIONARY").map(PathBuf::from),
        })
    }

    /// Size threshold above which a header section is block-split.
    pub fn presplit_threshold(&self) -> usize {
        (self.presplit_chunk_size * 2).max(self.presplit_chunk_size + self.presplit_overlap)
    }

    pub fn effective_breakpoint_amount(&self) -> f32 {
        self.breakpoint_amount
            .unwrap_or_else(|| self.breakpoint_type.default_amount())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::invalid("max_chunk_size", "must be greater than zero"));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(ConfigError::invalid(
                "min_chunk_size",
                format!(
                    "{} exceeds max_chunk_size {}",
                    self.min_chunk_size, self.max_chunk_size
                ),
            ));
        }
        let threshold = self.cohesion_drop_threshold;
        let threshold_ok = match self.cohesion_measure {
            CohesionMeasure::Delta => threshold.is_finite() && threshold >= 0.0,
            CohesionMeasure::Distance => (0.0..=1.0).contains(&threshold),
        };
        if !threshold_ok {
            return Err(ConfigError::invalid(
                "cohesion_drop_threshold",
                format!("{threshold} out of range for {:?}", self.cohesion_measure),
            ));
        }
        if self.presplit_chunk_size == 0 {
            return Err(ConfigError::invalid("presplit_chunk_size", "must be greater than zero"));
        }
        if self.presplit_overlap >= self.presplit_chunk_size {
            return Err(ConfigError::invalid(
                "presplit_overlap",
                "must be smaller than presplit_chunk_size",
            ));
        }
        if self.breakpoint_buffer_size == 0 {
            return Err(ConfigError::invalid("breakpoint_buffer_size", "must be at least 1"));
        }
        let amount = self.effective_breakpoint_amount();
        let amount_ok = match self.breakpoint_type {
            BreakpointType::Percentile => (0.0..=100.0).contains(&amount),
            BreakpointType::StandardDeviation | BreakpointType::Interquartile => {
                amount.is_finite() && amount >= 0.0
            }
        };
        if !amount_ok {
            return Err(ConfigError::invalid(
                "breakpoint_amount",
                format!("{amount} is out of range for {:?}", self.breakpoint_type),
            ));
        }
        Ok(())
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "gemini", "openai", "ollama"
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: usize,
    pub batch_size: usize,
    /// Maximum provider batches in flight at once.
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "models/text-embedding-004".to_string(),
            api_key: None,
            base_url: None,
            dimensions: 768,
            batch_size: 128,
            concurrency: 4,
        }
    }
}

impl EmbeddingConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let d = Self::default();
        let provider = profiled_env_or(p, "EMBEDDING_PROVIDER", &d.provider).to_lowercase();
        let provider_key = match provider.as_str() {
            "gemini" => profiled_env_opt(p, "GEMINI_API_KEY"),
            "openai" => profiled_env_opt(p, "OPENAI_API_KEY"),
            _ => None,
        };
        let default_model = match provider.as_str() {
            "openai" => "text-embedding-3-small",
            "ollama" => "nomic-embed-text",
            _ => "models/text-embedding-004",
        };
        Ok(Self {
            model: profiled_env_opt(p, "EMBEDDING_MODEL")
                .or_else(|| profiled_env_opt(p, "GEMINI_EMBED_MODEL").filter(|_| provider == "gemini"))
                .unwrap_or_else(|| default_model.to_string()),
            api_key: profiled_env_opt(p, "EMBEDDING_API_KEY").or(provider_key),
            base_url: profiled_env_opt(p, "EMBEDDING_BASE_URL"),
            dimensions: profiled_env_parse(p, "EMBEDDING_DIMENSIONS", d.dimensions)?,
            batch_size: profiled_env_parse(p, "BATCH_SIZE", d.batch_size)?,
            concurrency: profiled_env_parse(p, "EMBEDDING_CONCURRENCY", d.concurrency)?,
            provider,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("embedding_batch_size", "must be greater than zero"));
        }
        if self.dimensions == 0 {
            return Err(ConfigError::invalid("embedding_dimensions", "must be greater than zero"));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::invalid("embedding_concurrency", "must be at least 1"));
        }
        Ok(())
    }
}

// ── Cache ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub directory: PathBuf,
    /// Entries kept in the in-memory LRU in front of the disk store.
    pub memory_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".chunk_cache"),
            memory_entries: 10_000,
        }
    }
}

impl CacheConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            directory: profiled_env_opt(p, "CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.directory),
            memory_entries: profiled_env_parse(p, "CACHE_MEMORY_ENTRIES", d.memory_entries)?,
        })
    }
}
