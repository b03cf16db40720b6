use std::sync::Arc;

use tracing::error;

use keepsake_db::Database;

use crate::error::ApiError;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    /// Mark auth cookies `Secure` (HTTPS deployments).
    pub secure_cookies: bool,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenService) -> Self {
        Self {
            db,
            tokens,
            secure_cookies: false,
        }
    }
}

/// Runs store work (SQLite calls, password hashing) off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
