use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed alert content. The relay announces that mail arrived, never what it says.
pub const ALERT_TITLE: &str = "New Email";
pub const ALERT_BODY: &str = "You have received a new email";
pub const DEFAULT_BADGE: u32 = 1;
pub const DEFAULT_SOUND: &str = "default";
pub const NOTIFICATION_CATEGORY: &str = "GMAIL_NOTIFICATION";

/// Push gateway environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GatewayEnvironment {
    /// Development builds talk to the sandbox gateway
    #[default]
    Sandbox,
    Production,
}

impl GatewayEnvironment {
    pub fn host(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "https://api.sandbox.push.apple.com",
            GatewayEnvironment::Production => "https://api.push.apple.com",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayEnvironment::Sandbox => "sandbox",
            GatewayEnvironment::Production => "production",
        }
    }
}

/// Extra data forwarded to the device alongside the alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadExtras {
    #[serde(rename = "emailAddress")]
    pub subscriber_identity: String,
    /// Opaque history position, forwarded untouched
    #[serde(rename = "historyId")]
    pub change_marker: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Notification derived from one push event; read-only once built
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedNotification {
    pub subscriber_identity: String,
    pub alert_title: String,
    pub alert_body: String,
    pub badge_count: u32,
    pub sound_name: String,
    pub category: String,
    pub payload_extras: PayloadExtras,
}

impl NormalizedNotification {
    /// Build the templated "new mail" notification for a subscriber
    pub fn new_mail(
        subscriber_identity: impl Into<String>,
        change_marker: serde_json::Value,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let subscriber_identity = subscriber_identity.into();
        Self {
            alert_title: ALERT_TITLE.to_string(),
            alert_body: ALERT_BODY.to_string(),
            badge_count: DEFAULT_BADGE,
            sound_name: DEFAULT_SOUND.to_string(),
            category: NOTIFICATION_CATEGORY.to_string(),
            payload_extras: PayloadExtras {
                subscriber_identity: subscriber_identity.clone(),
                change_marker,
                timestamp: generated_at,
            },
            subscriber_identity,
        }
    }
}

/// A device registration as read from the registry store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEndpoint {
    pub subscriber_identity: String,
    pub device_token: String,
    pub registered_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Why a single device delivery did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("signing key retrieval failed: {0}")]
    KeyRetrievalFailed(String),

    #[error("token signing failed: {0}")]
    SigningFailed(String),

    #[error("gateway rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("delivery failed: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::KeyRetrievalFailed(_) => "key_retrieval",
            DispatchError::SigningFailed(_) => "signing",
            DispatchError::Rejected { .. } => "rejected",
            DispatchError::Transport(_) => "transport",
        }
    }

    /// Gateway status code, when the gateway answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result of delivering to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted by the gateway; carries the request correlation id
    Delivered(String),
    Failed(DispatchError),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered(_))
    }
}

/// Outcome paired with the device it belongs to
#[derive(Debug, Clone)]
pub struct DeviceOutcome {
    pub device_token: String,
    pub outcome: DispatchOutcome,
}

/// Aggregate counts for one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchSummary {
    /// Fold one outcome into the counts. Order-independent.
    pub fn record(&mut self, outcome: &DispatchOutcome) {
        self.attempted += 1;
        if outcome.is_delivered() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Everything a fan-out produced: counts plus per-device detail
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub summary: DispatchSummary,
    pub outcomes: Vec<DeviceOutcome>,
}

impl DispatchReport {
    pub fn outcome_for(&self, device_token: &str) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.device_token == device_token)
            .map(|o| &o.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mail_template() {
        let now = Utc::now();
        let notification =
            NormalizedNotification::new_mail("a@x.com", serde_json::json!("9"), now);

        assert_eq!(notification.subscriber_identity, "a@x.com");
        assert_eq!(notification.alert_title, "New Email");
        assert_eq!(notification.alert_body, "You have received a new email");
        assert_eq!(notification.badge_count, 1);
        assert_eq!(notification.sound_name, "default");
        assert_eq!(notification.category, "GMAIL_NOTIFICATION");
        assert_eq!(notification.payload_extras.subscriber_identity, "a@x.com");
        assert_eq!(notification.payload_extras.timestamp, now);
    }

    #[test]
    fn test_payload_extras_wire_names() {
        let extras = PayloadExtras {
            subscriber_identity: "a@x.com".to_string(),
            change_marker: serde_json::json!(12345),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&extras).unwrap();
        assert_eq!(value["emailAddress"], "a@x.com");
        assert_eq!(value["historyId"], 12345);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_summary_fold() {
        let mut summary = DispatchSummary::default();
        summary.record(&DispatchOutcome::Delivered("id-1".into()));
        summary.record(&DispatchOutcome::Failed(DispatchError::Rejected {
            status: 410,
            body: "{\"reason\":\"Unregistered\"}".into(),
        }));
        summary.record(&DispatchOutcome::Failed(DispatchError::Transport("timeout".into())));

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn test_rejected_reason_embeds_status_and_body() {
        let err = DispatchError::Rejected {
            status: 410,
            body: "{\"reason\":\"Unregistered\"}".into(),
        };
        let reason = err.to_string();
        assert!(reason.contains("410"));
        assert!(reason.contains("Unregistered"));
        assert_eq!(err.status(), Some(410));
        assert_eq!(err.kind(), "rejected");
    }

    #[test]
    fn test_environment_hosts() {
        assert_eq!(
            GatewayEnvironment::Sandbox.host(),
            "https://api.sandbox.push.apple.com"
        );
        assert_eq!(
            GatewayEnvironment::Production.host(),
            "https://api.push.apple.com"
        );
        let env: GatewayEnvironment = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(env, GatewayEnvironment::Production);
    }
}
