//! Provider-token signing for the push gateway.
//!
//! Tokens are ES256 JWTs minted fresh for every delivery call. The PEM key
//! material behind them is fetched from the secret provider once and kept for
//! the lifetime of the signer; a failed fetch leaves the cache empty so the
//! next call retries.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::ApnsConfig;
use crate::metrics::SigningMetrics;
use crate::secrets::SecretProvider;

use super::types::DispatchError;

/// Validity window of a provider token
pub const TOKEN_VALIDITY_SECONDS: i64 = 3600;

/// Audience claim expected by the gateway
pub const TOKEN_AUDIENCE: &str = "apns";

/// Claims carried by a provider token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderClaims {
    /// Team identifier
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub aud: String,
}

/// A signed credential, held in memory only
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenSigner {
    team_id: String,
    key_id: String,
    key_secret_name: String,
    provider: Arc<dyn SecretProvider>,
    key_material: OnceCell<Arc<str>>,
}

impl TokenSigner {
    pub fn new(config: &ApnsConfig, provider: Arc<dyn SecretProvider>) -> Self {
        Self {
            team_id: config.team_id.clone(),
            key_id: config.key_id.clone(),
            key_secret_name: config.key_secret_name.clone(),
            provider,
            key_material: OnceCell::new(),
        }
    }

    /// Whether key material has been fetched and cached
    pub fn is_key_cached(&self) -> bool {
        self.key_material.initialized()
    }

    /// Sign a fresh token valid from now
    pub async fn sign(&self) -> Result<SignedToken, DispatchError> {
        self.sign_at(Utc::now()).await
    }

    /// Sign a token issued at the given instant
    pub async fn sign_at(&self, issued_at: DateTime<Utc>) -> Result<SignedToken, DispatchError> {
        let pem = self.key_material().await?;

        let encoding_key = EncodingKey::from_ec_pem(pem.as_bytes())
            .map_err(|e| DispatchError::SigningFailed(format!("invalid EC key: {}", e)))?;

        let expires_at = issued_at + Duration::seconds(TOKEN_VALIDITY_SECONDS);
        let claims = ProviderClaims {
            iss: self.team_id.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            aud: TOKEN_AUDIENCE.to_string(),
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let value = encode(&header, &claims, &encoding_key)
            .map_err(|e| DispatchError::SigningFailed(e.to_string()))?;

        Ok(SignedToken {
            value,
            issued_at,
            expires_at,
        })
    }

    /// Cached key material, fetching it on first use
    async fn key_material(&self) -> Result<Arc<str>, DispatchError> {
        let pem = self
            .key_material
            .get_or_try_init(|| async {
                match self.provider.fetch(&self.key_secret_name).await {
                    Ok(pem) => {
                        SigningMetrics::record_key_fetch(true);
                        tracing::info!(
                            secret = %self.key_secret_name,
                            source = self.provider.source_name(),
                            "Signing key loaded"
                        );
                        Ok(Arc::<str>::from(pem))
                    }
                    Err(e) => {
                        SigningMetrics::record_key_fetch(false);
                        tracing::error!(
                            secret = %self.key_secret_name,
                            error = %e,
                            "Failed to retrieve signing key"
                        );
                        Err(DispatchError::KeyRetrievalFailed(e.to_string()))
                    }
                }
            })
            .await?;
        Ok(pem.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};

    use crate::relay::test_support::{apns_config, TEST_KEY};
    use crate::secrets::SecretError;

    const TEST_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/apns_test_key.pub.pem");

    /// Fails the first `failures` fetches, then returns `value`
    struct FlakyProvider {
        value: String,
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn new(value: &str, failures: usize) -> Self {
            Self {
                value: value.to_string(),
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecretProvider for FlakyProvider {
        async fn fetch(&self, name: &str) -> Result<String, SecretError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SecretError::Backend(format!("{} unavailable", name)));
            }
            Ok(self.value.clone())
        }

        fn source_name(&self) -> &'static str {
            "test"
        }
    }

    #[tokio::test]
    async fn test_sign_produces_verifiable_token() {
        let provider = Arc::new(FlakyProvider::new(TEST_KEY, 0));
        let signer = TokenSigner::new(&apns_config(None), provider);

        let token = signer.sign().await.unwrap();
        assert_eq!(
            (token.expires_at - token.issued_at).num_seconds(),
            TOKEN_VALIDITY_SECONDS
        );

        let header = decode_header(&token.value).unwrap();
        assert_eq!(header.alg, Algorithm::ES256);
        assert_eq!(header.kid.as_deref(), Some("KEY1234567"));

        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&["TEAM123456"]);
        let key = DecodingKey::from_ec_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
        let data = decode::<ProviderClaims>(&token.value, &key, &validation).unwrap();

        assert_eq!(data.claims.iss, "TEAM123456");
        assert_eq!(data.claims.aud, "apns");
        assert_eq!(data.claims.exp - data.claims.iat, TOKEN_VALIDITY_SECONDS);
    }

    #[tokio::test]
    async fn test_key_fetched_once() {
        let provider = Arc::new(FlakyProvider::new(TEST_KEY, 0));
        let signer = TokenSigner::new(&apns_config(None), provider.clone());

        signer.sign().await.unwrap();
        signer.sign().await.unwrap();
        signer.sign().await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(signer.is_key_cached());
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_poison_cache() {
        let provider = Arc::new(FlakyProvider::new(TEST_KEY, 2));
        let signer = TokenSigner::new(&apns_config(None), provider.clone());

        for _ in 0..2 {
            let result = signer.sign().await;
            assert!(matches!(result, Err(DispatchError::KeyRetrievalFailed(_))));
            assert!(!signer.is_key_cached());
        }

        assert!(signer.sign().await.is_ok());
        assert!(signer.is_key_cached());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_key_fails_signing() {
        let provider = Arc::new(FlakyProvider::new("not a pem key", 0));
        let signer = TokenSigner::new(&apns_config(None), provider);

        let result = signer.sign().await;
        assert!(matches!(result, Err(DispatchError::SigningFailed(_))));
    }

    #[tokio::test]
    async fn test_each_call_signs_new_token() {
        let provider = Arc::new(FlakyProvider::new(TEST_KEY, 0));
        let signer = TokenSigner::new(&apns_config(None), provider);

        let first = signer.sign_at(Utc::now()).await.unwrap();
        let second = signer
            .sign_at(Utc::now() + Duration::seconds(5))
            .await
            .unwrap();

        assert_ne!(first.value, second.value);
        assert!(second.issued_at > first.issued_at);
    }
}
