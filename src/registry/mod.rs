//! Device registry lookup.
//!
//! The relay only reads registrations; creating and deleting them is owned by
//! the registration service. Backends:
//!
//! - `MemoryDeviceRegistry`: DashMap-backed, for development and tests
//! - `RedisDeviceRegistry`: one Redis hash per subscriber identity
//!
//! Use `create_device_registry()` to pick a backend from configuration.

mod memory_backend;
mod redis_backend;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::RegistryConfig;
use crate::redis::pool::RedisPool;
use crate::relay::DeviceEndpoint;

pub use memory_backend::MemoryDeviceRegistry;
pub use redis_backend::RedisDeviceRegistry;

/// Errors from registry lookups
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Store unreachable or circuit open
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Read access to device registrations
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Backend name for logging and health output
    fn backend_name(&self) -> &'static str;

    /// Devices registered for a subscriber, oldest registration first.
    ///
    /// An empty list is a normal result meaning nothing to notify.
    async fn list_devices(
        &self,
        subscriber_identity: &str,
    ) -> Result<Vec<DeviceEndpoint>, RegistryError>;
}

/// Sort registrations by registration time, then token
pub(crate) fn order_devices(devices: &mut [DeviceEndpoint]) {
    devices.sort_by(|a, b| {
        a.registered_at
            .cmp(&b.registered_at)
            .then_with(|| a.device_token.cmp(&b.device_token))
    });
}

/// Create a device registry based on configuration.
///
/// - `"redis"`: Returns a `RedisDeviceRegistry` if a Redis pool is provided
/// - `"memory"` (default): Returns an empty `MemoryDeviceRegistry`
pub fn create_device_registry(
    settings: &RegistryConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn DeviceRegistry> {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis device registry"
                );
                Arc::new(RedisDeviceRegistry::new(pool, settings.redis_prefix.clone()))
            } else {
                tracing::warn!(
                    "Redis device registry requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryDeviceRegistry::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory device registry");
            Arc::new(MemoryDeviceRegistry::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_defaults_to_memory() {
        let registry = create_device_registry(&RegistryConfig::default(), None);
        assert_eq!(registry.backend_name(), "memory");
    }

    #[test]
    fn test_factory_redis_without_pool_falls_back() {
        let settings = RegistryConfig {
            backend: "redis".to_string(),
            redis_prefix: "devices".to_string(),
        };
        let registry = create_device_registry(&settings, None);
        assert_eq!(registry.backend_name(), "memory");
    }
}
