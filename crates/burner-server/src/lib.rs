pub mod auth;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod secret;
pub mod server;
pub mod store;

use std::sync::Arc;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub secrets: secret::SecretService,
    /// Bearer token for the admin routes. `None` locks them entirely.
    pub admin_token: Option<Arc<str>>,
}

pub use error::ServiceError;
pub use server::{read_key_file, resolve_data_dir, router, run, ServerConfig};
