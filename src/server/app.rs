use axum::{body::Body, http::Request, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::Span;

use crate::api::api_routes;

use super::AppState;

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.settings.server.max_body_bytes;

    Router::new()
        .merge(api_routes(state.clone()))
        // Add middleware
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(RequestBodyLimitLayer::new(body_limit))
        // Add state
        .with_state(state)
}

/// Request span without the query string, which carries the webhook token
fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        version = ?req.version(),
    )
}
