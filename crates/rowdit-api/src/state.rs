use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use rowdit_db::{Database, DbError};
use rowdit_kv::KeyValueStore;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub kv: Arc<dyn KeyValueStore>,
    pub config: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub cookie_name: String,
    /// Mark the session cookie `Secure` (HTTPS only).
    pub secure_cookies: bool,
    pub session_ttl: Duration,
    pub reset_token_ttl: Duration,
    /// Base URL of the web client, used to build password-reset links.
    pub frontend_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cookie_name: "qid".into(),
            secure_cookies: false,
            session_ttl: Duration::from_secs(60 * 60 * 24 * 365 * 10), // 10 years
            reset_token_ttl: Duration::from_secs(60 * 60 * 24 * 3),    // 3 days
            frontend_url: "http://localhost:3000".into(),
        }
    }
}

impl AppStateInner {
    /// Run a blocking DB call off the async runtime.
    pub async fn db_call<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Store(e.to_string())
            })?
            .map_err(ApiError::from)
    }
}
