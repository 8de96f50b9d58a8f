//! Named limiters, one per configured operation class.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::limiter::FixedWindowLimiter;
use super::rules::RateLimitRules;
use crate::error::{RatewardenError, Result};
use crate::store::CounterStore;

/// Limiter over a type-erased store, as held by the registry.
pub type SharedLimiter = Arc<FixedWindowLimiter<dyn CounterStore>>;

/// All limiters of a process, sharing one counter store.
pub struct LimiterRegistry {
    limiters: HashMap<String, SharedLimiter>,
}

impl LimiterRegistry {
    /// Build one limiter per rule, keyed as `prefix` + operation name.
    pub fn from_rules(
        store: Arc<dyn CounterStore>,
        rules: &RateLimitRules,
        prefix: &str,
    ) -> Result<Self> {
        let mut limiters = HashMap::with_capacity(rules.len());

        for (operation, rule) in rules.iter() {
            let config = rule.window_config(prefix, operation);
            debug!(
                operation = %operation,
                key = %config.key,
                max_requests = config.max_requests,
                window_secs = config.window.as_secs(),
                "Registering limiter"
            );
            let limiter = FixedWindowLimiter::new(Arc::clone(&store), config)?;
            limiters.insert(operation.to_string(), Arc::new(limiter));
        }

        Ok(Self { limiters })
    }

    /// Look up the limiter for an operation class.
    pub fn get(&self, operation: &str) -> Option<SharedLimiter> {
        self.limiters.get(operation).cloned()
    }

    /// Like [`get`](Self::get), failing for unknown operations.
    pub fn limiter(&self, operation: &str) -> Result<SharedLimiter> {
        self.get(operation).ok_or_else(|| {
            RatewardenError::Config(format!("no rate limit configured for '{}'", operation))
        })
    }

    /// Configured operation names, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.limiters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::rules::LimitRule;
    use crate::ratelimit::window::DEFAULT_KEY_PREFIX;
    use crate::store::MemoryStore;

    fn rules() -> RateLimitRules {
        RateLimitRules::from_yaml(
            r#"
user_creation:
  max_requests: 1
  window_seconds: 60
user_reads:
  max_requests: 2
  window_seconds: 60
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_registry_builds_each_operation() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
        let registry = LimiterRegistry::from_rules(store, &rules(), DEFAULT_KEY_PREFIX).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.operations(), vec!["user_creation", "user_reads"]);
        assert_eq!(
            registry.limiter("user_reads").unwrap().key().as_str(),
            "rate_limiter:user_reads"
        );
    }

    #[tokio::test]
    async fn test_operations_have_separate_windows() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
        let registry = LimiterRegistry::from_rules(store, &rules(), DEFAULT_KEY_PREFIX).unwrap();

        let creation = registry.limiter("user_creation").unwrap();
        let reads = registry.limiter("user_reads").unwrap();

        assert!(creation.is_allowed().await.unwrap());
        assert!(!creation.is_allowed().await.unwrap());

        assert!(reads.is_allowed().await.unwrap());
        assert!(reads.is_allowed().await.unwrap());
        assert!(!reads.is_allowed().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());
        let registry = LimiterRegistry::from_rules(store, &rules(), DEFAULT_KEY_PREFIX).unwrap();

        assert!(registry.get("user_deletion").is_none());
        assert!(matches!(
            registry.limiter("user_deletion"),
            Err(RatewardenError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_rule_fails_construction() {
        let mut rules = RateLimitRules::empty();
        rules.insert(
            "broken",
            LimitRule {
                max_requests: 0,
                window_seconds: 60,
                on_store_error: Default::default(),
            },
        );
        let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::new());

        assert!(LimiterRegistry::from_rules(store, &rules, DEFAULT_KEY_PREFIX).is_err());
    }
}
