//! Redis connection pool for the device registry.
//!
//! Holds one multiplexed connection shared across tasks. Every command goes
//! through the circuit breaker so a store outage fails fast.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RedisHealth, RedisHealthStatus};

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: CircuitBreaker,
    health: RedisHealth,
    url: String,
}

/// Errors that mean the store itself is unreachable, as opposed to a bad reply
fn is_outage(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout()
}

impl RedisPool {
    pub fn new(config: &RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::from(config)),
            health: RedisHealth::new(),
            url: config.url.clone(),
        })
    }

    /// Shared connection, connecting lazily
    async fn connection(&self) -> RedisResult<MultiplexedConnection> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        let conn = self.client.get_multiplexed_tokio_connection().await?;
        *conn_guard = Some(conn.clone());
        tracing::info!("Registry Redis connection established");
        Ok(conn)
    }

    /// Run a command with circuit breaker bookkeeping.
    ///
    /// Returns `CircuitOpen` without touching the network while the breaker is
    /// open. Outage errors discard the connection so the next call reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        if !self.circuit_breaker.try_acquire() {
            self.health.set(RedisHealthStatus::CircuitOpen);
            return Err(PoolError::CircuitOpen);
        }

        let result = match self.connection().await {
            Ok(conn) => f(conn).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => {
                self.circuit_breaker.record_success();
                self.health.set(RedisHealthStatus::Connected);
                Ok(value)
            }
            Err(e) if is_outage(&e) => {
                *self.connection.write().await = None;
                self.circuit_breaker.record_failure();
                self.health.set(RedisHealthStatus::Disconnected);
                tracing::error!(error = %e, "Registry Redis unreachable");
                Err(PoolError::Redis(e))
            }
            Err(e) => {
                // The store answered, so the breaker sees a healthy round trip
                self.circuit_breaker.record_success();
                self.health.set(RedisHealthStatus::Connected);
                Err(PoolError::Redis(e))
            }
        }
    }

    /// All field/value pairs of a hash
    pub async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError> {
        let key = key.to_string();
        self.execute(|mut conn| async move { conn.hgetall(key).await })
            .await
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    pub fn is_healthy(&self) -> bool {
        self.health.status() == RedisHealthStatus::Connected
            && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn health_status(&self) -> RedisHealthStatus {
        self.health.status()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}
