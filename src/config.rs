//! Run configuration.
//!
//! Typed defaults plus `ANON_*` environment overrides. Persisting and
//! merging a config file is the front-end's job; the core only consumes the
//! built values, applies env overrides, and rejects invalid combinations
//! before a run starts. An override that fails to parse is reported by
//! variable name and the run never begins.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub const APP_NAME: &str = "Expurgo";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "expurgo=info,reqwest=warn"
}

/// Default logs directory: ~/Expurgo/logs (user-visible on all platforms).
pub fn default_logs_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME).join("logs")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment override {name} has invalid value {value:?}: expected {expected}")]
    InvalidOverride {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("max_context_tokens must be positive")]
    ZeroTokenBudget,

    #[error("safety_factor must be in (0, 1], got {0}")]
    BadSafetyFactor(f64),

    #[error("effective token budget is zero (max_context_tokens {max}, safety_factor {safety})")]
    BudgetTooSmall { max: usize, safety: f64 },

    #[error("overlap of {overlap} tokens does not fit the effective budget of {budget}")]
    OverlapTooLarge { overlap: usize, budget: usize },

    #[error("overlap_tokens {overlap} requires the stitch_left merge strategy")]
    OverlapNeedsStitch { overlap: usize },

    #[error("stitch_left merge strategy requires overlap_tokens > 0")]
    StitchNeedsOverlap,

    #[error("timeout_seconds must be positive")]
    ZeroTimeout,
}

/// How chunk outputs are recomposed. Paired with the overlap setting; the
/// two branches are one strategy choice, so an invalid pairing is a
/// configuration error instead of a silently mishandled case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Chunks are exactly adjacent; outputs concatenate.
    Exact,
    /// Chunks overlap; the left chunk owns the shared region.
    StitchLeft,
}

impl FromStr for MergeStrategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "stitch_left" => Ok(Self::StitchLeft),
            _ => Err(()),
        }
    }
}

fn redact_api_key<S: Serializer>(_key: &str, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str("***")
}

/// Endpoint settings for the OpenAI-compatible completion server.
#[derive(Debug, Clone, Serialize)]
pub struct LmApiConfig {
    pub base_url: String,
    /// Redacted in serialized snapshots.
    #[serde(serialize_with = "redact_api_key")]
    pub api_key: String,
    pub model: String,
}

impl Default for LmApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1234/v1".into(),
            api_key: "lm-studio".into(),
            model: "granite-3.1-8b-instruct".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkingConfig {
    pub max_context_tokens: usize,
    pub overlap_tokens: usize,
    pub safety_factor: f64,
    pub merge_strategy: MergeStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 2500,
            overlap_tokens: 0,
            safety_factor: 0.85,
            merge_strategy: MergeStrategy::Exact,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceParams {
    pub max_output_tokens: u32,
    pub stop_sequences: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            stop_sequences: vec!["</s>".into()],
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfig {
    pub logs_dir: PathBuf,
    /// Allow document content into logs, previews and the HTML diff.
    pub debug_content_logging: bool,
    pub diff_enabled: bool,
    pub max_retries: u32,
    pub retry_backoff_seconds: f64,
    /// Strict: any post-scan finding or inference failure aborts the run.
    pub strict_mode: bool,
    /// On a strict abort, still emit a sentinel-substituted partial document
    /// instead of no document at all.
    pub emit_partial_on_abort: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            debug_content_logging: false,
            diff_enabled: true,
            max_retries: 2,
            retry_backoff_seconds: 2.0,
            strict_mode: false,
            emit_partial_on_abort: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub lm_api: LmApiConfig,
    pub chunking: ChunkingConfig,
    pub inference: InferenceParams,
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid values and invalid combinations before the run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chunking;
        if c.max_context_tokens == 0 {
            return Err(ConfigError::ZeroTokenBudget);
        }
        if !(c.safety_factor > 0.0 && c.safety_factor <= 1.0) {
            return Err(ConfigError::BadSafetyFactor(c.safety_factor));
        }

        let budget =
            crate::pipeline::chunking::effective_budget(c.max_context_tokens, c.safety_factor);
        if budget == 0 {
            return Err(ConfigError::BudgetTooSmall {
                max: c.max_context_tokens,
                safety: c.safety_factor,
            });
        }
        if c.overlap_tokens >= budget {
            return Err(ConfigError::OverlapTooLarge {
                overlap: c.overlap_tokens,
                budget,
            });
        }

        match (c.overlap_tokens, c.merge_strategy) {
            (0, MergeStrategy::Exact) => {}
            (0, MergeStrategy::StitchLeft) => return Err(ConfigError::StitchNeedsOverlap),
            (_, MergeStrategy::StitchLeft) => {}
            (overlap, MergeStrategy::Exact) => {
                return Err(ConfigError::OverlapNeedsStitch { overlap })
            }
        }

        if self.inference.timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Environment variables the core honors.
pub const ENV_VARS: &[&str] = &[
    "ANON_API_BASE",
    "ANON_API_KEY",
    "ANON_MODEL",
    "ANON_MAX_CONTEXT_TOKENS",
    "ANON_OVERLAP_TOKENS",
    "ANON_SAFETY_FACTOR",
    "ANON_MERGE_STRATEGY",
    "ANON_MAX_OUTPUT_TOKENS",
    "ANON_STOP_SEQUENCES",
    "ANON_TIMEOUT_SECONDS",
    "ANON_LOGS_DIR",
    "ANON_DEBUG",
    "ANON_DIFF_ENABLED",
    "ANON_MAX_RETRIES",
    "ANON_RETRY_BACKOFF_SECONDS",
    "ANON_STRICT_MODE",
    "ANON_EMIT_PARTIAL_ON_ABORT",
];

/// Fold every set `ANON_*` variable into `config`.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    for name in ENV_VARS {
        if let Ok(value) = std::env::var(name) {
            apply_override(config, name, &value)?;
        }
    }
    Ok(())
}

/// Apply one named override. Unknown names are ignored (not ours).
pub fn apply_override(config: &mut Config, name: &str, value: &str) -> Result<(), ConfigError> {
    match name {
        "ANON_API_BASE" => config.lm_api.base_url = value.to_string(),
        "ANON_API_KEY" => config.lm_api.api_key = value.to_string(),
        "ANON_MODEL" => config.lm_api.model = value.to_string(),
        "ANON_MAX_CONTEXT_TOKENS" => {
            config.chunking.max_context_tokens = parse_num(name, value, "a positive integer")?
        }
        "ANON_OVERLAP_TOKENS" => {
            config.chunking.overlap_tokens = parse_num(name, value, "a non-negative integer")?
        }
        "ANON_SAFETY_FACTOR" => {
            config.chunking.safety_factor = parse_num(name, value, "a number in (0, 1]")?
        }
        "ANON_MERGE_STRATEGY" => {
            config.chunking.merge_strategy =
                value.parse().map_err(|_| ConfigError::InvalidOverride {
                    name: name.to_string(),
                    value: value.to_string(),
                    expected: "\"exact\" or \"stitch_left\"",
                })?
        }
        "ANON_MAX_OUTPUT_TOKENS" => {
            config.inference.max_output_tokens = parse_num(name, value, "a positive integer")?
        }
        "ANON_STOP_SEQUENCES" => {
            config.inference.stop_sequences = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        "ANON_TIMEOUT_SECONDS" => {
            config.inference.timeout_seconds = parse_num(name, value, "a positive integer")?
        }
        "ANON_LOGS_DIR" => config.runtime.logs_dir = PathBuf::from(value),
        "ANON_DEBUG" => config.runtime.debug_content_logging = parse_bool(name, value)?,
        "ANON_DIFF_ENABLED" => config.runtime.diff_enabled = parse_bool(name, value)?,
        "ANON_MAX_RETRIES" => {
            config.runtime.max_retries = parse_num(name, value, "a non-negative integer")?
        }
        "ANON_RETRY_BACKOFF_SECONDS" => {
            config.runtime.retry_backoff_seconds = parse_num(name, value, "a non-negative number")?
        }
        "ANON_STRICT_MODE" => config.runtime.strict_mode = parse_bool(name, value)?,
        "ANON_EMIT_PARTIAL_ON_ABORT" => {
            config.runtime.emit_partial_on_abort = parse_bool(name, value)?
        }
        _ => {}
    }
    Ok(())
}

fn parse_num<T: FromStr>(
    name: &str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        name: name.to_string(),
        value: value.to_string(),
        expected,
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            name: name.to_string(),
            value: value.to_string(),
            expected: "a boolean (1/0, true/false, yes/no)",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn overrides_apply_typed_values() {
        let mut config = Config::default();
        apply_override(&mut config, "ANON_MAX_CONTEXT_TOKENS", "1200").unwrap();
        apply_override(&mut config, "ANON_SAFETY_FACTOR", "0.9").unwrap();
        apply_override(&mut config, "ANON_STRICT_MODE", "yes").unwrap();
        apply_override(&mut config, "ANON_MODEL", "otro-modelo").unwrap();
        apply_override(&mut config, "ANON_STOP_SEQUENCES", "</s>, FIN").unwrap();

        assert_eq!(config.chunking.max_context_tokens, 1200);
        assert!((config.chunking.safety_factor - 0.9).abs() < f64::EPSILON);
        assert!(config.runtime.strict_mode);
        assert_eq!(config.lm_api.model, "otro-modelo");
        assert_eq!(config.inference.stop_sequences, vec!["</s>", "FIN"]);
    }

    #[test]
    fn unparseable_override_is_reported_by_name() {
        let mut config = Config::default();
        let err = apply_override(&mut config, "ANON_MAX_CONTEXT_TOKENS", "dos mil").unwrap_err();
        match err {
            ConfigError::InvalidOverride { name, value, .. } => {
                assert_eq!(name, "ANON_MAX_CONTEXT_TOKENS");
                assert_eq!(value, "dos mil");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ambiguous_boolean_is_rejected() {
        let mut config = Config::default();
        let err = apply_override(&mut config, "ANON_DEBUG", "quizás").unwrap_err();
        assert!(err.to_string().contains("ANON_DEBUG"));
    }

    #[test]
    fn merge_strategy_parses_both_variants() {
        let mut config = Config::default();
        apply_override(&mut config, "ANON_MERGE_STRATEGY", "stitch_left").unwrap();
        assert_eq!(config.chunking.merge_strategy, MergeStrategy::StitchLeft);
        apply_override(&mut config, "ANON_MERGE_STRATEGY", "exact").unwrap();
        assert_eq!(config.chunking.merge_strategy, MergeStrategy::Exact);
        assert!(apply_override(&mut config, "ANON_MERGE_STRATEGY", "best_effort").is_err());
    }

    #[test]
    fn overlap_without_stitch_is_rejected() {
        let mut config = Config::default();
        config.chunking.overlap_tokens = 50;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::OverlapNeedsStitch { overlap: 50 }));
    }

    #[test]
    fn stitch_without_overlap_is_rejected() {
        let mut config = Config::default();
        config.chunking.merge_strategy = MergeStrategy::StitchLeft;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::StitchNeedsOverlap
        ));
    }

    #[test]
    fn overlap_must_fit_effective_budget() {
        let mut config = Config::default();
        config.chunking.max_context_tokens = 100;
        config.chunking.safety_factor = 0.5;
        config.chunking.overlap_tokens = 50;
        config.chunking.merge_strategy = MergeStrategy::StitchLeft;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::OverlapTooLarge {
                overlap: 50,
                budget: 50
            }
        ));
    }

    #[test]
    fn safety_factor_out_of_range_is_rejected() {
        let mut config = Config::default();
        config.chunking.safety_factor = 0.0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::BadSafetyFactor(_)
        ));
        config.chunking.safety_factor = 1.2;
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::BadSafetyFactor(_)
        ));
    }

    #[test]
    fn snapshot_redacts_api_key() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("lm-studio"));
        assert!(json.contains("\"api_key\":\"***\""));
        assert!(json.contains("granite-3.1-8b-instruct"));
    }

    #[test]
    fn valid_overlap_stitch_pairing_passes() {
        let mut config = Config::default();
        config.chunking.overlap_tokens = 100;
        config.chunking.merge_strategy = MergeStrategy::StitchLeft;
        config.validate().unwrap();
    }
}
