//! Engine configuration types for arflow.
//!
//! `EngineConfig` represents the top-level `arflow.toml` that controls retry
//! limits, the failure policy table, triage thresholds, graph interrupt
//! points and advisor connectivity. Every field has a default.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Top-level configuration for the pipeline engine.
///
/// Loaded from `~/.arflow/arflow.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retries allowed per instance before the policy's `at_limit` action applies.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Default concurrency ceiling for batch runs.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// SQLite URL for the checkpoint store (defaults to `{data_dir}/arflow.db`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default)]
    pub retry_backoff: RetryBackoffConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub triage: TriageConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub advisors: AdvisorConfig,
}

fn default_max_retries() -> u32 {
    3
}

fn default_batch_concurrency() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            batch_concurrency: default_batch_concurrency(),
            database_url: None,
            retry_backoff: RetryBackoffConfig::default(),
            policy: PolicyConfig::default(),
            triage: TriageConfig::default(),
            graph: GraphConfig::default(),
            advisors: AdvisorConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Retry backoff
// ---------------------------------------------------------------------------

/// Exponential delay applied before re-entering a failed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBackoffConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryBackoffConfig {
    /// No waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            backoff_factor: 1.0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let base = (self.initial_delay_ms as f64) * self.backoff_factor.powi(exp);
        base.min(self.max_delay_ms as f64).round().max(0.0) as u64
    }
}

// ---------------------------------------------------------------------------
// Failure policy
// ---------------------------------------------------------------------------

/// What the runner does with a failed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Retry,
    Escalate,
    HumanReview,
    Fail,
}

/// Actions for one error kind, below and at/above the retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub below_limit: PolicyAction,
    pub at_limit: PolicyAction,
}

impl PolicyRule {
    pub const fn new(below_limit: PolicyAction, at_limit: PolicyAction) -> Self {
        Self {
            below_limit,
            at_limit,
        }
    }
}

/// Decision table from error kind to policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_transient_rule")]
    pub transient: PolicyRule,
    #[serde(default = "default_data_validation_rule")]
    pub data_validation: PolicyRule,
    #[serde(default = "default_structural_rule")]
    pub structural: PolicyRule,
    #[serde(default = "default_unknown_rule")]
    pub unknown: PolicyRule,
}

fn default_transient_rule() -> PolicyRule {
    PolicyRule::new(PolicyAction::Retry, PolicyAction::Escalate)
}

fn default_data_validation_rule() -> PolicyRule {
    PolicyRule::new(PolicyAction::HumanReview, PolicyAction::HumanReview)
}

fn default_structural_rule() -> PolicyRule {
    PolicyRule::new(PolicyAction::Escalate, PolicyAction::Escalate)
}

fn default_unknown_rule() -> PolicyRule {
    PolicyRule::new(PolicyAction::Escalate, PolicyAction::Escalate)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            transient: default_transient_rule(),
            data_validation: default_data_validation_rule(),
            structural: default_structural_rule(),
            unknown: default_unknown_rule(),
        }
    }
}

impl PolicyConfig {
    pub fn rule(&self, kind: ErrorKind) -> PolicyRule {
        match kind {
            ErrorKind::Transient => self.transient,
            ErrorKind::DataValidation => self.data_validation,
            ErrorKind::Structural => self.structural,
            ErrorKind::Unknown => self.unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Triage
// ---------------------------------------------------------------------------

/// Thresholds the triage node classifies accumulated results with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Validation confidence below this requires review.
    #[serde(default = "default_review_confidence_below")]
    pub review_confidence_below: f64,
    /// Amounts at or above this require review.
    #[serde(default = "default_review_amount_at_least")]
    pub review_amount_at_least: f64,
    /// Collection risk at or above this escalates.
    #[serde(default = "default_escalate_risk_at_least")]
    pub escalate_risk_at_least: f64,
    /// Notify the payer once the export is rendered.
    #[serde(default = "default_notify_on_export")]
    pub notify_on_export: bool,
}

fn default_review_confidence_below() -> f64 {
    0.80
}

fn default_review_amount_at_least() -> f64 {
    50_000.0
}

fn default_escalate_risk_at_least() -> f64 {
    0.90
}

fn default_notify_on_export() -> bool {
    true
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            review_confidence_below: default_review_confidence_below(),
            review_amount_at_least: default_review_amount_at_least(),
            escalate_risk_at_least: default_escalate_risk_at_least(),
            notify_on_export: default_notify_on_export(),
        }
    }
}

// ---------------------------------------------------------------------------
// Graph / advisors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Park every approved instance before export for a final sign-off.
    #[serde(default)]
    pub interrupt_before_export: bool,
}

/// Connectivity for the HTTP advisor gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisorConfig {
    #[serde(default = "default_advisor_base_url")]
    pub base_url: String,
    /// Per-call deadline; a timed-out call is a transient failure.
    #[serde(default = "default_advisor_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_advisor_base_url() -> String {
    "http://127.0.0.1:8700".to_string()
}

fn default_advisor_timeout_secs() -> u64 {
    30
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: default_advisor_base_url(),
            timeout_secs: default_advisor_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.batch_concurrency, 8);
        assert!(config.database_url.is_none());
        assert!(!config.graph.interrupt_before_export);
    }

    #[test]
    fn test_engine_config_deserialize_with_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.policy, PolicyConfig::default());
        assert_eq!(config.advisors.timeout_secs, 30);
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
max_retries = 5
batch_concurrency = 2

[retry_backoff]
initial_delay_ms = 50

[policy.data_validation]
below_limit = "retry"
at_limit = "fail"

[triage]
review_amount_at_least = 1000.0

[graph]
interrupt_before_export = true
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.batch_concurrency, 2);
        assert_eq!(config.retry_backoff.initial_delay_ms, 50);
        assert_eq!(config.retry_backoff.max_delay_ms, 10_000);
        assert_eq!(
            config.policy.rule(ErrorKind::DataValidation),
            PolicyRule::new(PolicyAction::Retry, PolicyAction::Fail)
        );
        assert_eq!(
            config.policy.rule(ErrorKind::Transient),
            PolicyRule::new(PolicyAction::Retry, PolicyAction::Escalate)
        );
        assert!((config.triage.review_amount_at_least - 1000.0).abs() < f64::EPSILON);
        assert!(config.graph.interrupt_before_export);
    }

    #[test]
    fn test_backoff_delay_sequence() {
        let backoff = RetryBackoffConfig {
            initial_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 1_000,
        };
        assert_eq!(backoff.delay_ms(1), 200);
        assert_eq!(backoff.delay_ms(2), 400);
        assert_eq!(backoff.delay_ms(3), 800);
        assert_eq!(backoff.delay_ms(4), 1_000);
        assert_eq!(RetryBackoffConfig::immediate().delay_ms(3), 0);
    }
}
