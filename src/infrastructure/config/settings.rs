use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::relay::GatewayEnvironment;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub apns: ApnsConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret the push subscription appends as `?token=`; unset disables the check
    #[serde(default)]
    pub webhook_token: Option<String>,
    /// Maximum accepted webhook body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Push gateway identity and transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsConfig {
    /// Developer team identifier, used as the token issuer
    pub team_id: String,
    /// Identifier of the signing key registered with the gateway
    pub key_id: String,
    /// App bundle identifier sent as the push topic
    pub bundle_id: String,
    #[serde(default)]
    pub environment: GatewayEnvironment,
    /// Name under which the secret provider stores the PEM signing key
    #[serde(default = "default_key_secret_name")]
    pub key_secret_name: String,
    /// Per-request timeout for gateway calls in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Overrides the environment-derived gateway host (proxies, tests)
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsConfig {
    /// Secret source: "env" or "file"
    #[serde(default = "default_secret_source")]
    pub source: String,
    /// Directory holding one file per secret (file source only)
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Registry backend: "memory" or "redis"
    #[serde(default = "default_registry_backend")]
    pub backend: String,
    /// Key prefix for device hashes in Redis
    #[serde(default = "default_registry_prefix")]
    pub redis_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    /// Seconds the circuit stays open before a single trial lookup
    #[serde(default = "default_cb_reset_timeout")]
    pub circuit_breaker_reset_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on simultaneous gateway calls within one fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_key_secret_name() -> String {
    "apns-signing-key".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_secret_source() -> String {
    "env".to_string()
}

fn default_registry_backend() -> String {
    "memory".to_string()
}

fn default_registry_prefix() -> String {
    "devices".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cb_failure_threshold() -> u32 {
    5
}

fn default_cb_reset_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    100
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("apns.environment", "sandbox")?
            .set_default("registry.backend", "memory")?
            .set_default("dispatch.max_concurrency", 100)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APNS__TEAM_ID, APNS__KEY_ID, REGISTRY__BACKEND, REDIS__URL, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ApnsConfig {
    /// Gateway base URL: explicit override, otherwise derived from the environment
    pub fn gateway_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.host().to_string())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_token: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            source: default_secret_source(),
            dir: None,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: default_registry_backend(),
            redis_prefix: default_registry_prefix(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_reset_timeout_seconds: default_cb_reset_timeout(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apns_config(base_url: Option<&str>) -> ApnsConfig {
        ApnsConfig {
            team_id: "TEAM123456".to_string(),
            key_id: "KEY1234567".to_string(),
            bundle_id: "com.example.mail".to_string(),
            environment: GatewayEnvironment::Production,
            key_secret_name: default_key_secret_name(),
            request_timeout_ms: default_request_timeout_ms(),
            base_url: base_url.map(str::to_string),
        }
    }

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let registry = RegistryConfig::default();
        assert_eq!(registry.backend, "memory");
        assert_eq!(registry.redis_prefix, "devices");

        assert_eq!(DispatchConfig::default().max_concurrency, 100);
    }

    #[test]
    fn test_gateway_url_from_environment() {
        let config = apns_config(None);
        assert_eq!(config.gateway_url(), "https://api.push.apple.com");
    }

    #[test]
    fn test_gateway_url_override() {
        let config = apns_config(Some("http://127.0.0.1:9999"));
        assert_eq!(config.gateway_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_deserialize_minimal_settings() {
        let json = r#"{
            "apns": {
                "team_id": "TEAM123456",
                "key_id": "KEY1234567",
                "bundle_id": "com.example.mail"
            }
        }"#;

        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.apns.environment, GatewayEnvironment::Sandbox);
        assert_eq!(settings.apns.key_secret_name, "apns-signing-key");
        assert_eq!(settings.secrets.source, "env");
        assert_eq!(settings.server_addr(), "0.0.0.0:8080");
    }
}
