//! Rate limit rules configuration.
//!
//! Rules map an operation class name to its window parameters. They are read
//! from the service configuration or from a standalone YAML document:
//!
//! ```yaml
//! user_creation:
//!   max_requests: 10
//!   window_seconds: 60
//!   on_store_error: fail_closed
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use super::window::{StoreFailurePolicy, WindowConfig, WindowKey};
use crate::error::{RatewardenError, Result};

/// Operation class limited when no rules are configured.
pub const DEFAULT_OPERATION: &str = "user_creation";

/// Parameters for one operation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Attempts admitted per window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Behaviour on store failure
    #[serde(default)]
    pub on_store_error: StoreFailurePolicy,
}

impl Default for LimitRule {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_seconds: 60,
            on_store_error: StoreFailurePolicy::default(),
        }
    }
}

impl LimitRule {
    /// Window configuration for this rule under `prefix` + `operation`.
    pub fn window_config(&self, prefix: &str, operation: &str) -> WindowConfig {
        WindowConfig::new(
            WindowKey::new(prefix, operation),
            self.max_requests,
            self.window_seconds,
        )
        .with_failure_policy(self.on_store_error)
    }
}

/// The full set of rules, keyed by operation class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateLimitRules {
    limits: BTreeMap<String, LimitRule>,
}

impl Default for RateLimitRules {
    fn default() -> Self {
        let mut limits = BTreeMap::new();
        limits.insert(DEFAULT_OPERATION.to_string(), LimitRule::default());
        Self { limits }
    }
}

impl RateLimitRules {
    /// Create an empty rule set.
    pub fn empty() -> Self {
        Self {
            limits: BTreeMap::new(),
        }
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RatewardenError::Config(format!("Failed to parse rate limit rules: {}", e)))
    }

    pub fn insert(&mut self, operation: impl Into<String>, rule: LimitRule) {
        self.limits.insert(operation.into(), rule);
    }

    pub fn get(&self, operation: &str) -> Option<&LimitRule> {
        self.limits.get(operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LimitRule)> {
        self.limits.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_rules_limit_user_creation() {
        let rules = RateLimitRules::default();
        assert_eq!(rules.len(), 1);
        let rule = rules.get(DEFAULT_OPERATION).unwrap();
        assert_eq!(rule.max_requests, 10);
        assert_eq!(rule.window_seconds, 60);
    }

    #[test]
    fn test_parse_rules() {
        let yaml = r#"
user_creation:
  max_requests: 5
  window_seconds: 60
user_reads:
  max_requests: 100
  window_seconds: 1
  on_store_error: fail_open
"#;
        let rules = RateLimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.len(), 2);

        let creation = rules.get("user_creation").unwrap();
        assert_eq!(creation.max_requests, 5);
        assert_eq!(creation.on_store_error, StoreFailurePolicy::Propagate);

        let reads = rules.get("user_reads").unwrap();
        assert_eq!(reads.on_store_error, StoreFailurePolicy::FailOpen);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("ratewarden-rules-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "user_creation:\n  max_requests: 3\n  window_seconds: 30\n  on_store_error: fail_open\n",
        )
        .unwrap();

        let rules = RateLimitRules::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(rules.len(), 1);
        let rule = rules.get("user_creation").unwrap();
        assert_eq!(rule.max_requests, 3);
        assert_eq!(rule.window_seconds, 30);
        assert_eq!(rule.on_store_error, StoreFailurePolicy::FailOpen);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            RateLimitRules::from_file("/nonexistent/rules.yaml"),
            Err(RatewardenError::Io(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let yaml = r#"
user_creation:
  max_requests: 5
"#;
        assert!(matches!(
            RateLimitRules::from_yaml(yaml),
            Err(RatewardenError::Config(_))
        ));
    }

    #[test]
    fn test_window_config_from_rule() {
        let rule = LimitRule {
            max_requests: 3,
            window_seconds: 30,
            on_store_error: StoreFailurePolicy::FailClosed,
        };
        let config = rule.window_config("rate_limiter:", "user_creation");

        assert_eq!(config.key.as_str(), "rate_limiter:user_creation");
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window, Duration::from_secs(30));
        assert_eq!(config.on_store_error, StoreFailurePolicy::FailClosed);
    }

    #[test]
    fn test_iter_is_sorted_by_operation() {
        let mut rules = RateLimitRules::empty();
        rules.insert("b", LimitRule::default());
        rules.insert("a", LimitRule::default());

        let names: Vec<&str> = rules.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
