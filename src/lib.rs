pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod intake;
pub mod listing;
pub mod models;
pub mod nonce;
pub mod openapi;
pub mod rate_limit;
pub mod repo;
pub mod routes;
pub mod security;
pub mod validation;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config as configure, AppState};
pub use security::SecurityHeaders;
