//! Redis-backed device registry.
//!
//! Layout written by the registration service:
//! `HSET {prefix}:{identity} {deviceToken} '{"registeredAt":...,"lastActive":...}'`

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::metrics::RegistryMetrics;
use crate::redis::pool::{PoolError, RedisPool};
use crate::relay::DeviceEndpoint;

use super::{order_devices, DeviceRegistry, RegistryError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRegistration {
    registered_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

pub struct RedisDeviceRegistry {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisDeviceRegistry {
    pub fn new(pool: Arc<RedisPool>, prefix: String) -> Self {
        Self { pool, prefix }
    }

    fn key(&self, subscriber_identity: &str) -> String {
        format!("{}:{}", self.prefix, subscriber_identity)
    }
}

/// Turn hash entries into endpoints, skipping entries that do not parse
fn parse_entries(subscriber_identity: &str, entries: Vec<(String, String)>) -> Vec<DeviceEndpoint> {
    let mut devices: Vec<DeviceEndpoint> = entries
        .into_iter()
        .filter_map(|(device_token, raw)| {
            match serde_json::from_str::<StoredRegistration>(&raw) {
                Ok(stored) => Some(DeviceEndpoint {
                    subscriber_identity: subscriber_identity.to_string(),
                    device_token,
                    registered_at: stored.registered_at,
                    last_active: stored.last_active,
                }),
                Err(e) => {
                    tracing::warn!(
                        subscriber = %subscriber_identity,
                        device_token = %device_token,
                        error = %e,
                        "Skipping unparseable device registration"
                    );
                    None
                }
            }
        })
        .collect();

    order_devices(&mut devices);
    devices
}

#[async_trait]
impl DeviceRegistry for RedisDeviceRegistry {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn list_devices(
        &self,
        subscriber_identity: &str,
    ) -> Result<Vec<DeviceEndpoint>, RegistryError> {
        let result = self.pool.hgetall(&self.key(subscriber_identity)).await;
        RegistryMetrics::set_circuit_state(self.pool.circuit_state());

        let entries = result.map_err(|e| match e {
            PoolError::CircuitOpen => RegistryError::Unavailable("circuit breaker open".to_string()),
            PoolError::Redis(e) => RegistryError::Unavailable(e.to_string()),
        })?;

        Ok(parse_entries(subscriber_identity, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::redis::CircuitState;

    #[test]
    fn test_parse_entries() {
        let entries = vec![
            (
                "token-late".to_string(),
                r#"{"registeredAt":"2026-01-02T00:00:00Z","lastActive":"2026-01-03T00:00:00Z"}"#
                    .to_string(),
            ),
            (
                "token-early".to_string(),
                r#"{"registeredAt":"2026-01-01T00:00:00Z","lastActive":"2026-01-01T12:00:00Z"}"#
                    .to_string(),
            ),
            ("token-bad".to_string(), "not json".to_string()),
        ];

        let devices = parse_entries("a@x.com", entries);
        let tokens: Vec<_> = devices.iter().map(|d| d.device_token.as_str()).collect();
        assert_eq!(tokens, vec!["token-early", "token-late"]);
        assert_eq!(devices[0].subscriber_identity, "a@x.com");
    }

    #[tokio::test]
    async fn test_store_outage_maps_to_unavailable() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            circuit_breaker_failure_threshold: 1,
            ..RedisConfig::default()
        };
        let pool = Arc::new(RedisPool::new(&config).unwrap());
        let registry = RedisDeviceRegistry::new(pool.clone(), "devices".to_string());

        assert_eq!(registry.key("a@x.com"), "devices:a@x.com");

        // First lookup is refused by the store, the second by the open breaker
        for _ in 0..2 {
            let result = registry.list_devices("a@x.com").await;
            assert!(matches!(result, Err(RegistryError::Unavailable(_))));
        }
        assert_eq!(pool.circuit_state(), CircuitState::Open);
    }
}
