use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use crate::error::RelayError;
use crate::metrics::DeliveryMetrics;
use crate::registry::{DeviceRegistry, RegistryError};

use super::dispatcher::PushDispatcher;
use super::types::{DeviceOutcome, DispatchReport, DispatchSummary, NormalizedNotification};

/// Default cap on simultaneous gateway calls within one fan-out
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// Statistics for the fan-out coordinator
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Events that reached device resolution
    pub events_processed: AtomicU64,
    /// Events whose subscriber had no registered devices
    pub events_without_devices: AtomicU64,
    /// Events aborted because the registry was unavailable
    pub registry_failures: AtomicU64,
    pub deliveries_attempted: AtomicU64,
    pub deliveries_succeeded: AtomicU64,
    pub deliveries_failed: AtomicU64,
}

impl CoordinatorStats {
    pub fn snapshot(&self) -> CoordinatorStatsSnapshot {
        CoordinatorStatsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_without_devices: self.events_without_devices.load(Ordering::Relaxed),
            registry_failures: self.registry_failures.load(Ordering::Relaxed),
            deliveries_attempted: self.deliveries_attempted.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }

    fn record_summary(&self, summary: &DispatchSummary) {
        self.deliveries_attempted
            .fetch_add(summary.attempted as u64, Ordering::Relaxed);
        self.deliveries_succeeded
            .fetch_add(summary.succeeded as u64, Ordering::Relaxed);
        self.deliveries_failed
            .fetch_add(summary.failed as u64, Ordering::Relaxed);
    }
}

/// Snapshot of coordinator statistics
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatsSnapshot {
    pub events_processed: u64,
    pub events_without_devices: u64,
    pub registry_failures: u64,
    pub deliveries_attempted: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
}

/// Resolves a subscriber's devices and delivers to all of them
pub struct FanoutCoordinator {
    registry: Arc<dyn DeviceRegistry>,
    dispatcher: Arc<PushDispatcher>,
    max_concurrency: usize,
    stats: CoordinatorStats,
}

impl FanoutCoordinator {
    pub fn new(registry: Arc<dyn DeviceRegistry>, dispatcher: Arc<PushDispatcher>) -> Self {
        Self::with_concurrency(registry, dispatcher, DEFAULT_MAX_CONCURRENCY)
    }

    pub fn with_concurrency(
        registry: Arc<dyn DeviceRegistry>,
        dispatcher: Arc<PushDispatcher>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            max_concurrency: max_concurrency.max(1),
            stats: CoordinatorStats::default(),
        }
    }

    pub fn stats(&self) -> CoordinatorStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn registry_backend(&self) -> &'static str {
        self.registry.backend_name()
    }

    /// Notify every device registered for `subscriber_identity`.
    ///
    /// Only a registry failure aborts the call. Per-device failures are counted
    /// in the report and never stop sibling deliveries.
    #[tracing::instrument(
        name = "coordinator.notify_all",
        skip(self, notification),
        fields(subscriber = %subscriber_identity)
    )]
    pub async fn notify_all(
        &self,
        subscriber_identity: &str,
        notification: &NormalizedNotification,
    ) -> Result<DispatchReport, RelayError> {
        self.stats.events_processed.fetch_add(1, Ordering::Relaxed);

        let devices = match self.registry.list_devices(subscriber_identity).await {
            Ok(devices) => devices,
            Err(RegistryError::Unavailable(reason)) => {
                self.stats.registry_failures.fetch_add(1, Ordering::Relaxed);
                return Err(RelayError::RegistryUnavailable(reason));
            }
        };

        DeliveryMetrics::record_batch_size(devices.len());

        if devices.is_empty() {
            self.stats
                .events_without_devices
                .fetch_add(1, Ordering::Relaxed);
            tracing::info!("No devices registered for subscriber");
            return Ok(DispatchReport::default());
        }

        let mut report = DispatchReport {
            summary: DispatchSummary::default(),
            outcomes: Vec::with_capacity(devices.len()),
        };

        // All deliveries run on this task; at most `max_concurrency` are in flight
        let mut in_flight = FuturesUnordered::new();
        for device in &devices {
            in_flight.push(async move {
                let outcome = self.dispatcher.dispatch_one(device, notification).await;
                DeviceOutcome {
                    device_token: device.device_token.clone(),
                    outcome,
                }
            });

            while in_flight.len() >= self.max_concurrency {
                match in_flight.next().await {
                    Some(result) => {
                        report.summary.record(&result.outcome);
                        report.outcomes.push(result);
                    }
                    None => break,
                }
            }
        }

        while let Some(result) = in_flight.next().await {
            report.summary.record(&result.outcome);
            report.outcomes.push(result);
        }

        self.stats.record_summary(&report.summary);

        tracing::info!(
            attempted = report.summary.attempted,
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            "Fan-out complete"
        );

        Ok(report)
    }
}
