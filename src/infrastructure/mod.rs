//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Unified error types
//! - `metrics`: Prometheus metrics helpers
//! - `redis`: Redis connection pool, circuit breaker, and health checks
//! - `secrets`: Secret providers for signing key material

pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
pub mod secrets;
