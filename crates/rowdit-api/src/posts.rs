use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::info;

use rowdit_db::format_timestamp;
use rowdit_db::models::PostRow;
use rowdit_types::api::{CreatePostRequest, PostResponse};
use rowdit_types::models::{PostId, User, UserId, VoteValue};

use crate::context::RequestContext;
use crate::convert;
use crate::error::ApiError;
use crate::loader::{BatchFn, BatchLoader};
use crate::state::AppState;

const MAX_LIMIT: u32 = 50;
const MAX_TITLE_LEN: usize = 300;

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: the `created_at` of the last post on the previous page.
    pub before: Option<DateTime<Utc>>,
    /// Id of that same post. Keeps posts with an equal `created_at` from
    /// falling between pages.
    pub before_id: Option<PostId>,
}

fn default_limit() -> u32 {
    10
}

pub async fn list_posts(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<PostQuery>,
) -> Result<Json<Vec<PostResponse>>, ApiError> {
    let limit = query.limit.min(MAX_LIMIT);
    let before = query.before.as_ref().map(format_timestamp);
    let before_id = query.before_id;

    let rows = state
        .db_call(move |db| db.list_posts(limit, before.as_deref(), before_id))
        .await?;

    Ok(Json(resolve_posts(&ctx, rows).await?))
}

pub async fn get_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(post_id): Path<PostId>,
) -> Result<Json<PostResponse>, ApiError> {
    let row = state
        .db_call(move |db| db.get_post(post_id))
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    Ok(Json(resolve_post(&ctx, row).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let creator_id = ctx.require_viewer()?;

    let title = req.title.trim().to_string();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(ApiError::InvalidInput(format!(
            "title must be 1 to {MAX_TITLE_LEN} characters"
        )));
    }

    let row = state
        .db_call(move |db| db.create_post(creator_id, &title))
        .await?;
    info!(post_id = row.id, creator_id, "post created");

    Ok((StatusCode::CREATED, Json(resolve_post(&ctx, row).await?)))
}

/// Resolve relations for many posts at once. All posts are resolved in the
/// same tick, so creators and vote states each cost one bulk fetch.
pub async fn resolve_posts(
    ctx: &RequestContext,
    rows: Vec<PostRow>,
) -> Result<Vec<PostResponse>, ApiError> {
    resolve_with(&ctx.loaders.users, &ctx.loaders.votes, ctx.viewer, rows).await
}

async fn resolve_post(ctx: &RequestContext, row: PostRow) -> Result<PostResponse, ApiError> {
    resolve_one(&ctx.loaders.users, &ctx.loaders.votes, ctx.viewer, row).await
}

async fn resolve_with<U, W>(
    users: &BatchLoader<UserId, User, U>,
    votes: &BatchLoader<(UserId, PostId), VoteValue, W>,
    viewer: Option<UserId>,
    rows: Vec<PostRow>,
) -> Result<Vec<PostResponse>, ApiError>
where
    U: BatchFn<UserId, User>,
    W: BatchFn<(UserId, PostId), VoteValue>,
{
    join_all(rows.into_iter().map(|row| resolve_one(users, votes, viewer, row)))
        .await
        .into_iter()
        .collect()
}

async fn resolve_one<U, W>(
    users: &BatchLoader<UserId, User, U>,
    votes: &BatchLoader<(UserId, PostId), VoteValue, W>,
    viewer: Option<UserId>,
    row: PostRow,
) -> Result<PostResponse, ApiError>
where
    U: BatchFn<UserId, User>,
    W: BatchFn<(UserId, PostId), VoteValue>,
{
    let creator = users.load(row.creator_id);
    let vote_status = async {
        match viewer {
            Some(viewer) => votes.load((viewer, row.id)).await,
            None => Ok(None),
        }
    };
    let (creator, vote_status) = tokio::join!(creator, vote_status);

    let post = convert::post(row);
    Ok(PostResponse {
        id: post.id,
        title: post.title,
        points: post.points,
        creator_id: post.creator_id,
        creator: creator?,
        vote_status: vote_status?,
        created_at: post.created_at,
        updated_at: post.updated_at,
    })
}
