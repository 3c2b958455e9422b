//! Push-event envelope decoding.
//!
//! The pub/sub feed delivers either its push wrapper (`{"message": {"data": ...}}`)
//! or the bare message (`{"data": ...}`). `data` is base64 text whose decoded form
//! is a JSON object naming the mailbox and its new history position.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::RelayError;

use super::types::NormalizedNotification;

/// Inbound event in either accepted shape
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PushEvent {
    /// Push-subscription wrapper
    Wrapped { message: PubSubMessage },
    /// The message itself
    Direct(PubSubMessage),
}

/// A single pub/sub message
#[derive(Debug, Deserialize)]
pub struct PubSubMessage {
    /// Base64-encoded payload
    pub data: serde_json::Value,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
}

impl PushEvent {
    pub fn message(&self) -> &PubSubMessage {
        match self {
            PushEvent::Wrapped { message } => message,
            PushEvent::Direct(message) => message,
        }
    }
}

/// Decoded mailbox change
#[derive(Debug, Deserialize)]
struct MailboxChange {
    #[serde(default, rename = "emailAddress")]
    email_address: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "historyId")]
    history_id: serde_json::Value,
}

impl MailboxChange {
    fn subscriber_identity(self) -> Option<(String, serde_json::Value)> {
        let identity = self
            .email_address
            .filter(|e| !e.is_empty())
            .or(self.email.filter(|e| !e.is_empty()))?;
        Some((identity, self.history_id))
    }
}

/// Decode a raw request body
pub fn decode_body(body: &[u8]) -> Result<NormalizedNotification, RelayError> {
    let raw: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::MalformedPayload(format!("request body is not JSON: {}", e)))?;
    decode(&raw)
}

/// Decode an envelope, stamping the notification with the current time
pub fn decode(raw: &serde_json::Value) -> Result<NormalizedNotification, RelayError> {
    decode_at(raw, Utc::now())
}

/// Decode an envelope with an explicit generation timestamp
pub fn decode_at(
    raw: &serde_json::Value,
    generated_at: DateTime<Utc>,
) -> Result<NormalizedNotification, RelayError> {
    let event = PushEvent::deserialize(raw).map_err(|_| RelayError::InvalidEnvelopeShape)?;
    let message = event.message();

    let data = message
        .data
        .as_str()
        .ok_or_else(|| RelayError::MalformedPayload("`data` is not a string".to_string()))?;

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| RelayError::MalformedPayload(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| RelayError::MalformedPayload(format!("invalid UTF-8: {}", e)))?;
    let change: MailboxChange = serde_json::from_str(&text)
        .map_err(|e| RelayError::MalformedPayload(format!("invalid JSON: {}", e)))?;

    let (identity, change_marker) = change.subscriber_identity().ok_or_else(|| {
        RelayError::MalformedPayload("missing `emailAddress` or `email`".to_string())
    })?;

    tracing::debug!(
        subscriber = %identity,
        message_id = ?message.message_id,
        "Decoded push event"
    );

    Ok(NormalizedNotification::new_mail(
        identity,
        change_marker,
        generated_at,
    ))
}
