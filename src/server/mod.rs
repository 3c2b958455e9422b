mod app;
mod middleware;
mod state;

pub use app::create_app;
pub use middleware::{extract_token, webhook_token_auth, WebhookQuery, WEBHOOK_TOKEN_HEADER};
pub use state::AppState;
