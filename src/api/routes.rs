use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{webhook_token_auth, AppState};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::webhook::receive_mailbox_event;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Push subscription endpoint
        .nest(
            "/webhook",
            Router::new()
                .route("/mailbox", post(receive_mailbox_event))
                .layer(middleware::from_fn_with_state(state, webhook_token_auth)),
        )
}
