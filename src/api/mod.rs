//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod routes;
mod webhook;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use webhook::{receive_mailbox_event, WebhookResponse};
