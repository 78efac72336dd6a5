//! Failure policy: maps an error kind and retry budget to an action.

use arflow_types::config::{PolicyAction, PolicyConfig};
use arflow_types::error::ErrorKind;

/// Stateless lookup over the configured decision table.
///
/// `retry` is only ever returned while `retry_count < max_retries`; a rule
/// that asks for a retry at the limit escalates instead.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: PolicyConfig,
}

impl RetryPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, kind: ErrorKind, retry_count: u32, max_retries: u32) -> PolicyAction {
        let rule = self.config.rule(kind);
        let below_limit = retry_count < max_retries;
        let action = if below_limit {
            rule.below_limit
        } else {
            rule.at_limit
        };

        if kind == ErrorKind::Unknown {
            tracing::warn!(retry_count, ?action, "unclassified node failure");
        }

        match action {
            PolicyAction::Retry if !below_limit => PolicyAction::Escalate,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arflow_types::config::PolicyRule;

    #[test]
    fn default_table() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(ErrorKind::Transient, 0, 3), PolicyAction::Retry);
        assert_eq!(policy.decide(ErrorKind::Transient, 2, 3), PolicyAction::Retry);
        assert_eq!(policy.decide(ErrorKind::Transient, 3, 3), PolicyAction::Escalate);
        assert_eq!(
            policy.decide(ErrorKind::DataValidation, 0, 3),
            PolicyAction::HumanReview
        );
        assert_eq!(
            policy.decide(ErrorKind::DataValidation, 5, 3),
            PolicyAction::HumanReview
        );
        assert_eq!(policy.decide(ErrorKind::Structural, 0, 3), PolicyAction::Escalate);
        assert_eq!(policy.decide(ErrorKind::Unknown, 0, 3), PolicyAction::Escalate);
    }

    #[test]
    fn zero_retry_budget_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(ErrorKind::Transient, 0, 0), PolicyAction::Escalate);
    }

    #[test]
    fn retry_at_limit_is_coerced_to_escalate() {
        let policy = RetryPolicy::new(PolicyConfig {
            structural: PolicyRule::new(PolicyAction::Retry, PolicyAction::Retry),
            ..PolicyConfig::default()
        });
        assert_eq!(policy.decide(ErrorKind::Structural, 1, 2), PolicyAction::Retry);
        assert_eq!(policy.decide(ErrorKind::Structural, 2, 2), PolicyAction::Escalate);
    }

    #[test]
    fn configured_fail_action() {
        let policy = RetryPolicy::new(PolicyConfig {
            data_validation: PolicyRule::new(PolicyAction::Fail, PolicyAction::Fail),
            ..PolicyConfig::default()
        });
        assert_eq!(policy.decide(ErrorKind::DataValidation, 0, 3), PolicyAction::Fail);
    }
}
