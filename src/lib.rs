// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::redis;
pub use infrastructure::secrets;

// Domain layer
pub mod registry;
pub mod relay;

// Application layer
pub mod api;
pub mod server;
