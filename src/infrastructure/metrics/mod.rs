//! Prometheus metrics for the relay.
//!
//! - Event metrics (webhook events received, by outcome)
//! - Delivery metrics (per-device results, failure kinds, latency, batch size)
//! - Signing metrics (key retrieval)
//! - Registry metrics (circuit breaker state)

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, EventMetrics, RegistryMetrics, SigningMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "relay";

lazy_static! {
    // ============================================================================
    // Event Metrics
    // ============================================================================

    /// Webhook events by outcome (accepted, invalid, registry_error)
    pub static ref EVENTS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_events_received_total", METRIC_PREFIX),
        "Total mailbox change events received",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Delivery Metrics
    // ============================================================================

    /// Per-device delivery results (delivered, failed)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total per-device push deliveries",
        &["result"]
    ).unwrap();

    /// Delivery failures by kind (key_retrieval, signing, rejected, transport)
    pub static ref DELIVERY_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failures_total", METRIC_PREFIX),
        "Total per-device delivery failures by kind",
        &["kind"]
    ).unwrap();

    /// Time spent on one device delivery, signing included
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Per-device delivery latency in seconds",
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Devices resolved per event
    pub static ref FANOUT_BATCH_SIZE: Histogram = register_histogram!(
        format!("{}_fanout_batch_size", METRIC_PREFIX),
        "Number of devices resolved per event",
        vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 25.0, 50.0]
    ).unwrap();

    // ============================================================================
    // Signing Metrics
    // ============================================================================

    /// Signing key retrievals by result (success, failure)
    pub static ref SIGNING_KEY_FETCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_signing_key_fetch_total", METRIC_PREFIX),
        "Total signing key retrieval attempts",
        &["result"]
    ).unwrap();

    // ============================================================================
    // Registry Metrics
    // ============================================================================

    /// Registry circuit breaker state (0=closed, 1=open, 2=half-open)
    pub static ref REGISTRY_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_registry_circuit_breaker_state", METRIC_PREFIX),
        "Device registry circuit breaker state (0=closed, 1=open, 2=half-open)"
    ).unwrap();
}
