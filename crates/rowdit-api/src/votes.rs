use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use rowdit_db::votes::VoteOutcome;
use rowdit_types::api::{VoteRequest, VoteResponse};
use rowdit_types::models::{PostId, UserId, VoteValue};

use crate::context::RequestContext;
use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};

/// Cast `viewer`'s vote on `post_id`.
///
/// Fails with `Unauthorized` when there is no viewer, `InvalidInput` for a
/// value other than -1 or 1, and `NotFound` when the post does not exist.
pub async fn cast_vote(
    state: &AppStateInner,
    viewer: Option<UserId>,
    post_id: PostId,
    value: i64,
) -> Result<VoteOutcome, ApiError> {
    let user_id = viewer.ok_or(ApiError::Unauthorized)?;
    let value = VoteValue::try_from(value).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    state
        .db_call(move |db| db.cast_vote(user_id, post_id, value))
        .await
}

pub async fn vote(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(post_id): Path<PostId>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let outcome = cast_vote(&state, ctx.viewer, post_id, req.value).await?;

    info!(
        post_id,
        user_id = ctx.viewer,
        transition = ?outcome.transition,
        points = outcome.points,
        "vote"
    );

    Ok(Json(VoteResponse {
        post_id,
        transition: outcome.transition,
        delta: outcome.delta,
        points: outcome.points,
        vote_status: outcome.value,
    }))
}
