//! Scheduling primitives: rate limiters and bounded retries.

pub mod rate_limiter;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

pub use rate_limiter::RateLimiter;
pub use retry::{with_retries, RetryOutcome};

/// Named limiters shared across loops.
///
/// The first caller for a name fixes its interval; later callers get the same limiter.
#[derive(Debug, Default, Clone)]
pub struct LimiterRegistry {
    limiters: Arc<DashMap<String, Arc<RateLimiter>>>,
}

impl LimiterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the limiter called `name`.
    pub fn get(&self, name: &str, interval: Duration) -> Arc<RateLimiter> {
        self.limiters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(name, interval)))
            .clone()
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    /// Whether no limiter is registered.
    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_shares_limiters_by_name() {
        let registry = LimiterRegistry::new();
        let a = registry.get("score", Duration::from_secs(1));
        let b = registry.get("score", Duration::from_secs(5));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.interval(), Duration::from_secs(1));

        let c = registry.get("feed", Duration::from_millis(500));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }
}
