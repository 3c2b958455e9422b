//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::redis::CircuitState;

use super::{
    DELIVERIES_TOTAL, DELIVERY_FAILURES_TOTAL, DELIVERY_LATENCY, EVENTS_RECEIVED_TOTAL,
    FANOUT_BATCH_SIZE, REGISTRY_CIRCUIT_BREAKER_STATE, SIGNING_KEY_FETCH_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording webhook event metrics
pub struct EventMetrics;

impl EventMetrics {
    pub fn record_accepted() {
        EVENTS_RECEIVED_TOTAL.with_label_values(&["accepted"]).inc();
    }

    pub fn record_invalid() {
        EVENTS_RECEIVED_TOTAL.with_label_values(&["invalid"]).inc();
    }

    pub fn record_registry_error() {
        EVENTS_RECEIVED_TOTAL.with_label_values(&["registry_error"]).inc();
    }
}

/// Helper struct for recording per-device delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_delivered(latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&["delivered"]).inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    pub fn record_failed(kind: &str, latency: Duration) {
        DELIVERIES_TOTAL.with_label_values(&["failed"]).inc();
        DELIVERY_FAILURES_TOTAL.with_label_values(&[kind]).inc();
        DELIVERY_LATENCY.observe(latency.as_secs_f64());
    }

    pub fn record_batch_size(devices: usize) {
        FANOUT_BATCH_SIZE.observe(devices as f64);
    }
}

/// Helper struct for signing key metrics
pub struct SigningMetrics;

impl SigningMetrics {
    pub fn record_key_fetch(success: bool) {
        let result = if success { "success" } else { "failure" };
        SIGNING_KEY_FETCH_TOTAL.with_label_values(&[result]).inc();
    }
}

/// Helper struct for registry metrics
pub struct RegistryMetrics;

impl RegistryMetrics {
    pub fn set_circuit_state(state: CircuitState) {
        REGISTRY_CIRCUIT_BREAKER_STATE.set(state.as_gauge());
    }
}
