use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;
use tracing::warn;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "auto_merge_threshold ({0}) must be >= quality_threshold ({1}); \
         a lower value would let auto-merge approve changes the ordinary gate blocks"
    )]
    AutoMergeBelowQuality(f64, f64),

    #[error("Invalid threshold {name}: {value}. Must be within [0.0, 1.0]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid collaborator_timeout_secs: {0}. Must be positive")]
    InvalidTimeout(u64),

    #[error("Invalid cost cap {name}: {value}. Must be positive")]
    InvalidCostCap { name: &'static str, value: f64 },

    #[error("Invalid convergence window: {0}. Must be at least 2")]
    InvalidWindow(usize),

    #[error("Invalid stagnation_limit: {0}. Must be at least 1")]
    InvalidStagnationLimit(u32),

    #[error("Storage directory cannot be empty: {0}")]
    EmptyStorageDir(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .kaizen/config.yaml (project config)
    /// 3. .kaizen/local.yaml (project local overrides, optional)
    /// 4. Environment variables (KAIZEN_* prefix, highest priority)
    ///
    /// An unreadable or malformed file falls back to the documented
    /// defaults with a warning; undefined values are never used silently.
    /// Validation failures are startup errors and do propagate.
    pub fn load() -> Result<Config> {
        let extracted: Result<Config, figment::Error> = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".kaizen/config.yaml"))
            .merge(Yaml::file(".kaizen/local.yaml"))
            .merge(Env::prefixed("KAIZEN_").split("__"))
            .extract();

        let config = match extracted {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "configuration unreadable; using defaults");
                Config::default()
            }
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let thresholds = [
            ("quality_threshold", config.thresholds.quality_threshold),
            (
                "auto_merge_threshold",
                config.thresholds.auto_merge_threshold,
            ),
            ("human_review_floor", config.thresholds.human_review_floor),
            ("performance_floor", config.advisory.performance_floor),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        // Never assumed, always checked: a stricter gate cannot sit below
        // the ordinary one.
        if config.thresholds.auto_merge_threshold < config.thresholds.quality_threshold {
            return Err(ConfigError::AutoMergeBelowQuality(
                config.thresholds.auto_merge_threshold,
                config.thresholds.quality_threshold,
            ));
        }

        if config.limits.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(0));
        }
        if config.limits.collaborator_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(0));
        }

        if config.cost.change_cap <= 0.0 {
            return Err(ConfigError::InvalidCostCap {
                name: "change_cap",
                value: config.cost.change_cap,
            });
        }
        if config.cost.period_cap <= 0.0 {
            return Err(ConfigError::InvalidCostCap {
                name: "period_cap",
                value: config.cost.period_cap,
            });
        }

        if config.convergence.window < 2 {
            return Err(ConfigError::InvalidWindow(config.convergence.window));
        }
        if config.convergence.stagnation_limit == 0 {
            return Err(ConfigError::InvalidStagnationLimit(0));
        }

        if config.storage.state_dir.is_empty() {
            return Err(ConfigError::EmptyStorageDir("state_dir"));
        }
        if config.storage.cost_dir.is_empty() {
            return Err(ConfigError::EmptyStorageDir("cost_dir"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
