use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};
use uuid::Uuid;

use rowdit_types::models::UserId;

use crate::error::ApiError;
use crate::state::{ApiConfig, AppStateInner};

const SESSION_PREFIX: &str = "sess:";
pub const FORGET_PASSWORD_PREFIX: &str = "forget-password:";

fn session_key(session_id: &str) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// Resolve a session id to the user it belongs to.
pub async fn lookup(state: &AppStateInner, session_id: &str) -> Result<Option<UserId>, ApiError> {
    let Some(raw) = state.kv.get(&session_key(session_id)).await? else {
        return Ok(None);
    };

    match raw.parse() {
        Ok(user_id) => Ok(Some(user_id)),
        Err(e) => {
            warn!("Corrupt session value '{}': {}", raw, e);
            Ok(None)
        }
    }
}

/// Create a session for `user_id` and attach its cookie to `jar`.
pub async fn start(
    state: &AppStateInner,
    jar: CookieJar,
    user_id: UserId,
) -> Result<CookieJar, ApiError> {
    let session_id = Uuid::new_v4().to_string();
    state
        .kv
        .set(
            &session_key(&session_id),
            &user_id.to_string(),
            state.config.session_ttl,
        )
        .await?;

    debug!(user_id, "session started");
    Ok(jar.add(session_cookie(&state.config, session_id)))
}

/// Delete the session and clear its cookie.
pub async fn end(
    state: &AppStateInner,
    jar: CookieJar,
    session_id: &str,
) -> Result<CookieJar, ApiError> {
    state.kv.del(&session_key(session_id)).await?;
    Ok(jar.remove(Cookie::build(state.config.cookie_name.clone()).path("/")))
}

fn session_cookie(config: &ApiConfig, session_id: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), session_id))
        .path("/")
        .http_only(true)
        // CSRF
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .build()
}
