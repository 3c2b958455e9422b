//! Notification dispatch core.
//!
//! event envelope -> `decoder` -> registry lookup -> `dispatcher` (one call per
//! device, concurrent) -> `coordinator` summary.
//!
//! - `decoder`: envelope validation and the templated "new mail" notification
//! - `signer`: ES256 provider tokens with cached key material
//! - `dispatcher`: one gateway call per device, failures folded into outcomes
//! - `coordinator`: bounded concurrent fan-out and result aggregation

pub mod coordinator;
pub mod decoder;
pub mod dispatcher;
pub mod signer;
mod types;

pub use coordinator::{CoordinatorStatsSnapshot, FanoutCoordinator};
pub use decoder::{decode, decode_at, decode_body, PushEvent};
pub use dispatcher::PushDispatcher;
pub use signer::{SignedToken, TokenSigner};
pub use types::{
    DeviceEndpoint, DeviceOutcome, DispatchError, DispatchOutcome, DispatchReport,
    DispatchSummary, GatewayEnvironment, NormalizedNotification, PayloadExtras,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::ApnsConfig;
    use crate::secrets::{SecretError, SecretProvider};

    use super::{GatewayEnvironment, TokenSigner};

    pub const TEST_KEY: &str = include_str!("../../tests/fixtures/apns_test_key.p8");

    /// Always returns the same secret
    pub struct StaticSecretProvider(pub String);

    #[async_trait]
    impl SecretProvider for StaticSecretProvider {
        async fn fetch(&self, _name: &str) -> Result<String, SecretError> {
            Ok(self.0.clone())
        }

        fn source_name(&self) -> &'static str {
            "static"
        }
    }

    pub fn apns_config(base_url: Option<&str>) -> ApnsConfig {
        ApnsConfig {
            team_id: "TEAM123456".to_string(),
            key_id: "KEY1234567".to_string(),
            bundle_id: "com.example.mail".to_string(),
            environment: GatewayEnvironment::Sandbox,
            key_secret_name: "apns-signing-key".to_string(),
            request_timeout_ms: 2_000,
            base_url: base_url.map(str::to_string),
        }
    }

    pub fn signer_with_key(config: &ApnsConfig, key: &str) -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new(
            config,
            Arc::new(StaticSecretProvider(key.to_string())),
        ))
    }
}
