use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::AppState;

/// Header alternative to the `token` query parameter
pub const WEBHOOK_TOKEN_HEADER: &str = "X-Webhook-Token";

/// Query parameters accepted on the webhook endpoint
#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub token: Option<String>,
}

/// Webhook token verification.
///
/// Push subscriptions carry the shared secret as `?token=...` on the endpoint
/// URL. When no token is configured every request is let through.
pub async fn webhook_token_auth(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = &state.settings.server.webhook_token else {
        return Ok(next.run(req).await);
    };

    match extract_token(&query, &headers) {
        Some(token) if tokens_match(token, expected) => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Invalid webhook token provided");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => {
            tracing::warn!("Missing webhook token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Token from the query string, falling back to the header
pub fn extract_token<'a>(query: &'a WebhookQuery, headers: &'a HeaderMap) -> Option<&'a str> {
    if let Some(ref token) = query.token {
        return Some(token.as_str());
    }

    headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
}

fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    fn query(uri: &str) -> WebhookQuery {
        let uri: Uri = uri.parse().unwrap();
        Query::<WebhookQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_extract_token_from_query() {
        let headers = HeaderMap::new();
        let query = query("/webhook/mailbox?foo=1&token=s3cret");
        assert_eq!(extract_token(&query, &headers), Some("s3cret"));
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        let headers = HeaderMap::new();
        let query = query("/webhook/mailbox?token=a%2Bb%2Fc%3D");
        assert_eq!(extract_token(&query, &headers), Some("a+b/c="));
    }

    #[test]
    fn test_extract_token_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        let query = query("/webhook/mailbox");
        assert_eq!(extract_token(&query, &headers), Some("s3cret"));
    }

    #[test]
    fn test_query_takes_precedence_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_TOKEN_HEADER, HeaderValue::from_static("from-header"));
        let query = query("/webhook/mailbox?token=from-query");
        assert_eq!(extract_token(&query, &headers), Some("from-query"));
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        let query = query("/webhook/mailbox");
        assert_eq!(extract_token(&query, &headers), None);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3cre"));
        assert!(!tokens_match("S3cret", "s3cret"));
    }
}
