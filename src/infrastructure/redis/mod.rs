//! Redis access for the device registry
//!
//! - `CircuitBreaker`: fails registry lookups fast while the store is down
//! - `RedisHealth`: last known connection status
//! - `pool`: shared multiplexed connection

mod circuit_breaker;
mod health;
pub mod pool;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use health::{RedisHealth, RedisHealthStatus};
pub use pool::{PoolError, RedisPool};

/// Get current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
