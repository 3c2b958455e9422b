use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::error::RelayError;
use crate::redis::RedisPool;
use crate::registry::{create_device_registry, DeviceRegistry};
use crate::relay::{FanoutCoordinator, PushDispatcher, TokenSigner};
use crate::secrets::{create_secret_provider, SecretProvider};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub signer: Arc<TokenSigner>,
    pub dispatcher: Arc<PushDispatcher>,
    pub coordinator: Arc<FanoutCoordinator>,
    pub redis_pool: Option<Arc<RedisPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the full relay from configuration
    pub fn new(settings: Settings) -> Result<Self, RelayError> {
        let redis_pool = if settings.registry.backend == "redis" {
            let pool = RedisPool::new(&settings.redis).map_err(|e| {
                RelayError::Internal(format!("invalid Redis configuration: {}", e))
            })?;
            Some(Arc::new(pool))
        } else {
            None
        };

        let registry = create_device_registry(&settings.registry, redis_pool.clone());
        let provider = create_secret_provider(&settings.secrets);

        let mut state = Self::with_components(settings, registry, provider)?;
        state.redis_pool = redis_pool;
        Ok(state)
    }

    /// Build the relay around an explicit registry and secret provider
    pub fn with_components(
        settings: Settings,
        registry: Arc<dyn DeviceRegistry>,
        provider: Arc<dyn SecretProvider>,
    ) -> Result<Self, RelayError> {
        let signer = Arc::new(TokenSigner::new(&settings.apns, provider));
        let dispatcher = Arc::new(PushDispatcher::new(&settings.apns, signer.clone())?);
        let coordinator = Arc::new(FanoutCoordinator::with_concurrency(
            registry,
            dispatcher.clone(),
            settings.dispatch.max_concurrency,
        ));

        tracing::info!(
            environment = dispatcher.environment().as_str(),
            gateway = %dispatcher.base_url(),
            registry = coordinator.registry_backend(),
            max_concurrency = settings.dispatch.max_concurrency,
            "Relay components initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            signer,
            dispatcher,
            coordinator,
            redis_pool: None,
            start_time: Instant::now(),
        })
    }
}
