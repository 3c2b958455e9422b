//! Registry store connection status

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RedisHealthStatus {
    /// No connection attempt has succeeded yet, or the last one was dropped
    Disconnected = 0,
    Connected = 1,
    /// Lookups are being refused by the circuit breaker
    CircuitOpen = 2,
}

impl RedisHealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedisHealthStatus::Disconnected => "disconnected",
            RedisHealthStatus::Connected => "connected",
            RedisHealthStatus::CircuitOpen => "circuit_open",
        }
    }
}

#[derive(Default)]
pub struct RedisHealth {
    status: AtomicU8,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: RedisHealthStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn status(&self) -> RedisHealthStatus {
        match self.status.load(Ordering::Acquire) {
            1 => RedisHealthStatus::Connected,
            2 => RedisHealthStatus::CircuitOpen,
            _ => RedisHealthStatus::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let health = RedisHealth::new();
        assert_eq!(health.status(), RedisHealthStatus::Disconnected);
    }

    #[test]
    fn test_status_round_trips_through_atomic() {
        let health = RedisHealth::new();

        health.set(RedisHealthStatus::Connected);
        assert_eq!(health.status().as_str(), "connected");

        health.set(RedisHealthStatus::CircuitOpen);
        assert_eq!(health.status().as_str(), "circuit_open");
    }
}
