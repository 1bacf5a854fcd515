//! Configuration tree for the kaizen loop.
//!
//! Loaded hierarchically by [`ConfigLoader`](crate::infrastructure::config::ConfigLoader):
//! programmatic defaults, then `.kaizen/config.yaml`, then `.kaizen/local.yaml`,
//! then `KAIZEN_*` environment variables.

use serde::{Deserialize, Serialize};

/// Main configuration structure for kaizen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Score thresholds and merge policy.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Iteration and timing limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Cost caps.
    #[serde(default)]
    pub cost: CostConfig,

    /// Human-approval rules, each independently toggleable.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Advisory (non-blocking) warning rules.
    #[serde(default)]
    pub advisory: AdvisoryConfig,

    /// Convergence-detection tuning.
    #[serde(default)]
    pub convergence: ConvergenceConfig,

    /// Persisted-state layout.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Score thresholds and merge policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ThresholdsConfig {
    /// Minimum weighted quality score for the merge gate.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f64,

    /// Stricter score bar for merging without human sign-off. Must be
    /// greater than or equal to `quality_threshold`; validated at startup.
    #[serde(default = "default_auto_merge_threshold")]
    pub auto_merge_threshold: f64,

    /// Score below which human review is requested even when gates pass.
    #[serde(default = "default_human_review_floor")]
    pub human_review_floor: f64,

    /// Whether auto-merge is permitted at all.
    #[serde(default)]
    pub auto_merge_enabled: bool,
}

const fn default_quality_threshold() -> f64 {
    0.85
}

const fn default_auto_merge_threshold() -> f64 {
    0.90
}

const fn default_human_review_floor() -> f64 {
    0.70
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            quality_threshold: default_quality_threshold(),
            auto_merge_threshold: default_auto_merge_threshold(),
            human_review_floor: default_human_review_floor(),
            auto_merge_enabled: false,
        }
    }
}

/// Iteration and timing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LimitsConfig {
    /// Hard iteration ceiling per change.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Explicit timeout applied to every collaborator call, seconds.
    #[serde(default = "default_collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,

    /// Average inter-iteration interval below which the suspicious-pattern
    /// scan flags abnormal automation speed, seconds.
    #[serde(default = "default_min_iteration_interval_secs")]
    pub min_iteration_interval_secs: u64,
}

const fn default_max_iterations() -> u32 {
    5
}

const fn default_collaborator_timeout_secs() -> u64 {
    600
}

const fn default_min_iteration_interval_secs() -> u64 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            collaborator_timeout_secs: default_collaborator_timeout_secs(),
            min_iteration_interval_secs: default_min_iteration_interval_secs(),
        }
    }
}

/// Cost caps in USD.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CostConfig {
    /// Per-change cumulative cost cap.
    #[serde(default = "default_change_cap")]
    pub change_cap: f64,

    /// Rolling billing-period cap across all changes.
    #[serde(default = "default_period_cap")]
    pub period_cap: f64,
}

const fn default_change_cap() -> f64 {
    5.0
}

const fn default_period_cap() -> f64 {
    250.0
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            change_cap: default_change_cap(),
            period_cap: default_period_cap(),
        }
    }
}

/// Human-approval rules. Each rule is independently toggleable; any enabled
/// rule that fires forces `requires_human_approval = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApprovalConfig {
    #[serde(default = "default_true")]
    pub on_score_below_floor: bool,

    #[serde(default = "default_true")]
    pub on_security_issues: bool,

    #[serde(default = "default_true")]
    pub on_iteration_cap: bool,

    #[serde(default = "default_true")]
    pub on_cost_cap: bool,

    /// CI failure forcing human approval is a deliberate hard default, made
    /// visible in the schema rather than hidden inside the decider.
    #[serde(default = "default_true")]
    pub on_ci_not_successful: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            on_score_below_floor: true,
            on_security_issues: true,
            on_iteration_cap: true,
            on_cost_cap: true,
            on_ci_not_successful: true,
        }
    }
}

/// Advisory warning rules. These never block a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdvisoryConfig {
    /// Soft minimum for the performance category score.
    #[serde(default = "default_performance_floor")]
    pub performance_floor: f64,

    /// Outstanding warning-severity issues above this count get flagged.
    #[serde(default = "default_max_outstanding_warnings")]
    pub max_outstanding_warnings: u32,
}

const fn default_performance_floor() -> f64 {
    0.70
}

const fn default_max_outstanding_warnings() -> u32 {
    10
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            performance_floor: default_performance_floor(),
            max_outstanding_warnings: default_max_outstanding_warnings(),
        }
    }
}

/// Convergence-detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConvergenceConfig {
    /// Trailing window of iterations the detector classifies over.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Consecutive stagnant iterations below threshold before the loop
    /// exhausts.
    #[serde(default = "default_stagnation_limit")]
    pub stagnation_limit: u32,
}

const fn default_window() -> usize {
    3
}

const fn default_stagnation_limit() -> u32 {
    3
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            stagnation_limit: default_stagnation_limit(),
        }
    }
}

/// Persisted-state layout. Both directories hold human-inspectable JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// One JSON state record per (repository, change-id).
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Append-only cost event logs plus the rolling period aggregate.
    #[serde(default = "default_cost_dir")]
    pub cost_dir: String,
}

fn default_state_dir() -> String {
    ".kaizen/state".to_string()
}

fn default_cost_dir() -> String {
    ".kaizen/costs".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            cost_dir: default_cost_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
