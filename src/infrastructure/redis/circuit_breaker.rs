//! Circuit breaker guarding registry store access.
//!
//! After `failure_threshold` consecutive failed lookups the breaker opens and
//! lookups fail fast. Once the cooldown has passed exactly one lookup is let
//! through as a trial; its result closes or reopens the breaker. A trial lookup that
//! never reports back frees its slot after another cooldown.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use crate::config::RedisConfig;

use super::current_time_ms;

/// Breaker state as reported to health checks and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// Cooldown elapsed, next lookup is a trial
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge value: 0 closed, 1 open, 2 half-open
    pub fn as_gauge(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown_ms: i64,
}

impl From<&RedisConfig> for CircuitBreakerConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            failure_threshold: config.circuit_breaker_failure_threshold.max(1),
            cooldown_ms: (config.circuit_breaker_reset_timeout_seconds as i64) * 1000,
        }
    }
}

/// Lock-free single-trial circuit breaker
pub struct CircuitBreaker {
    consecutive_failures: AtomicU32,
    /// 0 while closed, otherwise when the breaker last opened
    opened_at_ms: AtomicI64,
    /// 0 when no trial lookup is running, otherwise when it started
    trial_started_ms: AtomicI64,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            opened_at_ms: AtomicI64::new(0),
            trial_started_ms: AtomicI64::new(0),
            config,
        }
    }

    pub fn state(&self) -> CircuitState {
        let opened_at = self.opened_at_ms.load(Ordering::Acquire);
        if opened_at == 0 {
            CircuitState::Closed
        } else if current_time_ms() - opened_at >= self.config.cooldown_ms {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether a lookup may reach the store.
    ///
    /// In half-open state only the caller that wins the trial slot gets `true`.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                let now = current_time_ms();
                let started = self.trial_started_ms.load(Ordering::Acquire);
                if started != 0 && now - started < self.config.cooldown_ms {
                    return false;
                }
                self.trial_started_ms
                    .compare_exchange(started, now, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            }
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        let was_open = self.opened_at_ms.swap(0, Ordering::AcqRel) != 0;
        self.trial_started_ms.store(0, Ordering::Release);
        if was_open {
            tracing::info!("Registry circuit breaker closed");
        }
    }

    pub fn record_failure(&self) {
        if self.trial_started_ms.swap(0, Ordering::AcqRel) != 0 {
            self.opened_at_ms.store(current_time_ms(), Ordering::Release);
            tracing::warn!("Registry trial lookup failed, circuit breaker reopened");
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.config.failure_threshold
            && self
                .opened_at_ms
                .compare_exchange(0, current_time_ms(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            tracing::warn!(failures, "Registry circuit breaker opened");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(failure_threshold: u32, cooldown_ms: i64) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            cooldown_ms,
        })
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, 60_000);

        cb.record_failure();
        cb.record_failure();
        assert!(cb.try_acquire());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn test_success_resets_failure_run() {
        let cb = breaker(3, 60_000);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_single_trial_after_cooldown() {
        let cb = breaker(1, 50);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.try_acquire());
        assert!(!cb.try_acquire());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_failed_trial_restarts_cooldown() {
        let cb = breaker(1, 50);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.try_acquire());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn test_abandoned_trial_frees_slot() {
        let cb = breaker(1, 50);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.try_acquire());
        assert!(!cb.try_acquire());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.try_acquire());
    }

    #[test]
    fn test_config_from_redis_settings() {
        let config = CircuitBreakerConfig::from(&RedisConfig::default());
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown_ms, 30_000);
    }
}
