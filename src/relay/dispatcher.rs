use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::config::ApnsConfig;
use crate::error::RelayError;
use crate::metrics::DeliveryMetrics;

use super::signer::TokenSigner;
use super::types::{
    DeviceEndpoint, DispatchError, DispatchOutcome, GatewayEnvironment, NormalizedNotification,
    PayloadExtras,
};

/// Push type header value for visible alerts
const PUSH_TYPE_ALERT: &str = "alert";

/// Immediate delivery priority
const PRIORITY_IMMEDIATE: &str = "10";

#[derive(Debug, Serialize)]
struct Alert<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct Aps<'a> {
    alert: Alert<'a>,
    badge: u32,
    sound: &'a str,
    category: &'a str,
}

/// Gateway request body
#[derive(Debug, Serialize)]
pub struct ApnsPayload<'a> {
    aps: Aps<'a>,
    gmail: &'a PayloadExtras,
}

impl<'a> ApnsPayload<'a> {
    pub fn from_notification(notification: &'a NormalizedNotification) -> Self {
        Self {
            aps: Aps {
                alert: Alert {
                    title: &notification.alert_title,
                    body: &notification.alert_body,
                },
                badge: notification.badge_count,
                sound: &notification.sound_name,
                category: &notification.category,
            },
            gmail: &notification.payload_extras,
        }
    }
}

/// Delivers one notification to one device through the push gateway
pub struct PushDispatcher {
    client: reqwest::Client,
    base_url: String,
    bundle_id: String,
    environment: GatewayEnvironment,
    signer: Arc<TokenSigner>,
}

impl PushDispatcher {
    pub fn new(config: &ApnsConfig, signer: Arc<TokenSigner>) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RelayError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gateway_url().trim_end_matches('/').to_string(),
            bundle_id: config.bundle_id.clone(),
            environment: config.environment,
            signer,
        })
    }

    pub fn environment(&self) -> GatewayEnvironment {
        self.environment
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn device_url(&self, device_token: &str) -> String {
        format!("{}/3/device/{}", self.base_url, device_token)
    }

    /// Deliver to a single device.
    ///
    /// Never fails outright: signing, transport and gateway errors all resolve
    /// to `DispatchOutcome::Failed`.
    #[tracing::instrument(
        name = "dispatcher.dispatch_one",
        skip(self, endpoint, notification),
        fields(
            subscriber = %endpoint.subscriber_identity,
            device_token = %endpoint.device_token
        )
    )]
    pub async fn dispatch_one(
        &self,
        endpoint: &DeviceEndpoint,
        notification: &NormalizedNotification,
    ) -> DispatchOutcome {
        let started = Instant::now();
        match self.deliver(endpoint, notification).await {
            Ok(correlation_id) => {
                DeliveryMetrics::record_delivered(started.elapsed());
                tracing::debug!(apns_id = %correlation_id, "Notification delivered");
                DispatchOutcome::Delivered(correlation_id)
            }
            Err(e) => {
                DeliveryMetrics::record_failed(e.kind(), started.elapsed());
                tracing::warn!(
                    kind = e.kind(),
                    gateway_status = ?e.status(),
                    reason = %e,
                    "Notification delivery failed"
                );
                DispatchOutcome::Failed(e)
            }
        }
    }

    async fn deliver(
        &self,
        endpoint: &DeviceEndpoint,
        notification: &NormalizedNotification,
    ) -> Result<String, DispatchError> {
        let token = self.signer.sign().await?;
        let correlation_id = Uuid::new_v4().to_string();
        let payload = ApnsPayload::from_notification(notification);

        let response = self
            .client
            .post(self.device_url(&endpoint.device_token))
            .header(reqwest::header::AUTHORIZATION, format!("bearer {}", token.value))
            .header("apns-push-type", PUSH_TYPE_ALERT)
            .header("apns-priority", PRIORITY_IMMEDIATE)
            .header("apns-topic", &self.bundle_id)
            .header("apns-id", &correlation_id)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(correlation_id);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));

        Err(DispatchError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
