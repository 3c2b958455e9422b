mod settings;

pub use settings::{
    ApnsConfig, DispatchConfig, RedisConfig, RegistryConfig, SecretsConfig, ServerConfig,
    Settings,
};
