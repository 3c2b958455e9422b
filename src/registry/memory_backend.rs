//! In-memory device registry

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::relay::DeviceEndpoint;

use super::{order_devices, DeviceRegistry, RegistryError};

/// Registrations keyed by subscriber identity, then device token
#[derive(Debug, Default)]
pub struct MemoryDeviceRegistry {
    devices: DashMap<String, DashMap<String, DeviceEndpoint>>,
}

impl MemoryDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a registration. Re-registering keeps the original `registered_at`.
    pub fn register(&self, subscriber_identity: &str, device_token: &str, at: DateTime<Utc>) {
        let entries = self
            .devices
            .entry(subscriber_identity.to_string())
            .or_default();

        entries
            .entry(device_token.to_string())
            .and_modify(|d| d.last_active = at)
            .or_insert_with(|| DeviceEndpoint {
                subscriber_identity: subscriber_identity.to_string(),
                device_token: device_token.to_string(),
                registered_at: at,
                last_active: at,
            });
    }

    /// Remove a registration; returns whether it existed
    pub fn unregister(&self, subscriber_identity: &str, device_token: &str) -> bool {
        let removed = self
            .devices
            .get(subscriber_identity)
            .map(|entries| entries.remove(device_token).is_some())
            .unwrap_or(false);

        self.devices
            .remove_if(subscriber_identity, |_, entries| entries.is_empty());
        removed
    }
}

#[async_trait]
impl DeviceRegistry for MemoryDeviceRegistry {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_devices(
        &self,
        subscriber_identity: &str,
    ) -> Result<Vec<DeviceEndpoint>, RegistryError> {
        let mut devices: Vec<DeviceEndpoint> = self
            .devices
            .get(subscriber_identity)
            .map(|entries| entries.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default();

        order_devices(&mut devices);
        Ok(devices)
    }
}
