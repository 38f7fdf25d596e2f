use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use rowdit_types::models::UserId;

use crate::error::ApiError;
use crate::loaders::Loaders;
use crate::session;
use crate::state::AppState;

/// Everything a handler knows about the caller, plus the loaders scoped to
/// this one request.
pub struct RequestContext {
    pub session_id: Option<String>,
    pub viewer: Option<UserId>,
    pub loaders: Loaders,
}

impl RequestContext {
    pub fn require_viewer(&self) -> Result<UserId, ApiError> {
        self.viewer.ok_or(ApiError::Unauthorized)
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(&state.config.cookie_name)
            .map(|c| c.value().to_string());

        let viewer = match &session_id {
            Some(id) => session::lookup(state, id).await?,
            None => None,
        };

        Ok(Self {
            session_id,
            viewer,
            loaders: Loaders::new(Arc::clone(&state.db)),
        })
    }
}
