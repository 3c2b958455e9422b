//! Push-subscription webhook: one mailbox change event per request.

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use crate::error::{RelayError, Result};
use crate::metrics::EventMetrics;
use crate::relay::decode_body;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    /// Devices whose delivery failed; absent when nothing was attempted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

/// POST /webhook/mailbox
///
/// Decode failures answer 400 and registry outages 500. Per-device delivery
/// failures only show up in `failed`, so the push subscription is acknowledged
/// and not redelivered.
#[tracing::instrument(name = "webhook.mailbox_event", skip(state, body), fields(bytes = body.len()))]
pub async fn receive_mailbox_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let notification = match decode_body(&body) {
        Ok(notification) => notification,
        Err(e) => {
            EventMetrics::record_invalid();
            return Err(e);
        }
    };

    let report = match state
        .coordinator
        .notify_all(&notification.subscriber_identity, &notification)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            if matches!(e, RelayError::RegistryUnavailable(_)) {
                EventMetrics::record_registry_error();
            }
            return Err(e);
        }
    };

    EventMetrics::record_accepted();

    let summary = report.summary;
    if summary.attempted == 0 {
        return Ok(Json(WebhookResponse {
            success: true,
            message: "No devices to notify".to_string(),
            failed: None,
        }));
    }

    for device in report.outcomes.iter().filter(|d| !d.outcome.is_delivered()) {
        tracing::warn!(
            device_token = %device.device_token,
            outcome = ?device.outcome,
            "Delivery failed"
        );
    }

    Ok(Json(WebhookResponse {
        success: true,
        message: format!(
            "Notifications sent to {} of {} devices",
            summary.succeeded, summary.attempted
        ),
        failed: Some(summary.failed),
    }))
}
