// Configuration loading and parsing (scout.toml).

use chrono::Datelike;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub engine: EngineConfig,
}

/// Tunables consumed by the scouting engine. `Default` mirrors the values
/// shipped in `defaults/scout.toml`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub calibration: CalibrationConfig,
    pub normalization: NormalizationConfig,
    pub similarity: SimilarityConfig,
    pub ratings: RatingsConfig,
    pub projection: ProjectionConfig,
}

// ---------------------------------------------------------------------------
// scout.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire scout.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ScoutFile {
    database: DatabaseSection,
    #[serde(default)]
    calibration: CalibrationConfig,
    #[serde(default)]
    normalization: NormalizationConfig,
    #[serde(default)]
    similarity: SimilarityConfig,
    #[serde(default)]
    ratings: RatingsConfig,
    #[serde(default)]
    projection: ProjectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

/// Participation thresholds for the level-weight calibration population.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// A batting row qualifies when PA is strictly greater than this.
    pub min_plate_appearances: f64,
    /// A pitching row qualifies when IP is strictly greater than this.
    pub min_innings: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_plate_appearances: 50.0,
            min_innings: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Minimum non-zero population values before data-driven anchors are
    /// trusted over the static fallback range.
    pub min_samples: usize,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            lower_percentile: 10.0,
            upper_percentile: 90.0,
            min_samples: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub default_k: usize,
    /// Pools smaller than this stay unfit and answer every query with an
    /// empty list.
    pub min_pool_size: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            min_pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatingsConfig {
    pub history_seasons: usize,
    pub trend_multiplier: f64,
    pub comp_count: usize,
}

impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            history_seasons: 5,
            trend_multiplier: 2.0,
            comp_count: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub comp_count: usize,
    pub prospect_optimism: f64,
    /// Comp cumulative value assumed for a prospect with no comparables.
    pub fallback_comp_value: f64,
    pub default_age: u32,
    /// Season treated as "now". Unset means the current calendar year.
    pub as_of_season: Option<i32>,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            comp_count: 5,
            prospect_optimism: 1.2,
            fallback_comp_value: 2.0,
            default_age: 24,
            as_of_season: None,
        }
    }
}

impl ProjectionConfig {
    pub fn current_season(&self) -> i32 {
        self.as_of_season
            .unwrap_or_else(|| chrono::Local::now().year())
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/scout.toml` relative to the
/// given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("scout.toml");
    let text = read_file(&path)?;
    let file: ScoutFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        db_path: file.database.path,
        engine: EngineConfig {
            calibration: file.calibration,
            normalization: file.normalization,
            similarity: file.similarity,
            ratings: file.ratings,
            projection: file.projection,
        },
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    let engine = &config.engine;

    let non_negative: &[(&str, f64)] = &[
        (
            "calibration.min_plate_appearances",
            engine.calibration.min_plate_appearances,
        ),
        ("calibration.min_innings", engine.calibration.min_innings),
        ("ratings.trend_multiplier", engine.ratings.trend_multiplier),
        (
            "projection.fallback_comp_value",
            engine.projection.fallback_comp_value,
        ),
    ];
    for (name, val) in non_negative {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }

    let norm = &engine.normalization;
    for (name, val) in [
        ("normalization.lower_percentile", norm.lower_percentile),
        ("normalization.upper_percentile", norm.upper_percentile),
    ] {
        if !(0.0..=100.0).contains(&val) {
            return Err(invalid(
                name,
                format!("must be between 0 and 100 inclusive, got {val}"),
            ));
        }
    }
    if norm.lower_percentile >= norm.upper_percentile {
        return Err(invalid(
            "normalization.upper_percentile",
            format!(
                "must be greater than lower_percentile ({}), got {}",
                norm.lower_percentile, norm.upper_percentile
            ),
        ));
    }

    let positive_counts: &[(&str, usize)] = &[
        ("normalization.min_samples", norm.min_samples),
        ("similarity.default_k", engine.similarity.default_k),
        ("ratings.history_seasons", engine.ratings.history_seasons),
        ("ratings.comp_count", engine.ratings.comp_count),
        ("projection.comp_count", engine.projection.comp_count),
    ];
    for (name, val) in positive_counts {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    if engine.similarity.min_pool_size < 2 {
        return Err(invalid(
            "similarity.min_pool_size",
            format!("must be >= 2, got {}", engine.similarity.min_pool_size),
        ));
    }

    let optimism = engine.projection.prospect_optimism;
    if !optimism.is_finite() || optimism <= 0.0 {
        return Err(invalid(
            "projection.prospect_optimism",
            format!("must be > 0, got {optimism}"),
        ));
    }

    if !(14..=50).contains(&engine.projection.default_age) {
        return Err(invalid(
            "projection.default_age",
            format!("must be between 14 and 50, got {}", engine.projection.default_age),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
