use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info, warn};
use uuid::Uuid;

use rowdit_types::api::{
    ChangePasswordRequest, FieldError, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    UserResponse,
};
use rowdit_types::models::{User, UserId};

use crate::context::RequestContext;
use crate::convert;
use crate::error::ApiError;
use crate::session::{self, FORGET_PASSWORD_PREFIX};
use crate::state::AppState;
use crate::validate::{validate_password, validate_register};

type UserReply = (StatusCode, CookieJar, Json<UserResponse>);

fn rejected(status: StatusCode, jar: CookieJar, errors: Vec<FieldError>) -> UserReply {
    (status, jar, Json(UserResponse::errors(errors)))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<UserReply, ApiError> {
    if let Some(e) = validate_register(&req) {
        return Ok(rejected(StatusCode::BAD_REQUEST, jar, vec![e]));
    }

    let password_hash = hash_password(&req.password)?;

    let RegisterRequest { username, email, .. } = req;
    let created = state
        .db_call(move |db| db.create_user(&username, &email, &password_hash))
        .await;

    let row = match created {
        Ok(row) => row,
        Err(ApiError::Conflict(field)) => {
            let errors = vec![FieldError::new(field, &format!("{field} already taken"))];
            return Ok(rejected(StatusCode::CONFLICT, jar, errors));
        }
        Err(e) => return Err(e),
    };

    info!(user_id = row.id, "user registered");

    // Log the new user in
    let jar = session::start(&state, jar, row.id).await?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(UserResponse::user(convert::user(row))),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<UserReply, ApiError> {
    let ident = req.username_or_email.clone();
    let user = state
        .db_call(move |db| {
            if ident.contains('@') {
                db.get_user_by_email(&ident)
            } else {
                db.get_user_by_username(&ident)
            }
        })
        .await?;

    let Some(user) = user else {
        let errors = vec![FieldError::new("username_or_email", "that user doesn't exist")];
        return Ok(rejected(StatusCode::UNAUTHORIZED, jar, errors));
    };

    if !verify_password(&user.password, &req.password)? {
        let errors = vec![FieldError::new("password", "incorrect password")];
        return Ok(rejected(StatusCode::UNAUTHORIZED, jar, errors));
    }

    let jar = session::start(&state, jar, user.id).await?;
    Ok((StatusCode::OK, jar, Json(UserResponse::user(convert::user(user)))))
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
) -> impl IntoResponse {
    let Some(session_id) = ctx.session_id else {
        return (jar, Json(true));
    };

    match session::end(&state, jar.clone(), &session_id).await {
        Ok(jar) => (jar, Json(true)),
        Err(e) => {
            error!("Failed to end session: {}", e);
            (jar, Json(false))
        }
    }
}

/// The logged-in user, or `null`.
pub async fn me(ctx: RequestContext) -> Result<Json<Option<User>>, ApiError> {
    let Some(viewer) = ctx.viewer else {
        return Ok(Json(None));
    };
    Ok(Json(ctx.loaders.users.load(viewer).await?))
}

/// Always answers `true` so callers cannot probe which emails are registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<bool>, ApiError> {
    let email = req.email.clone();
    let Some(user) = state.db_call(move |db| db.get_user_by_email(&email)).await? else {
        return Ok(Json(true));
    };

    let token = Uuid::new_v4().to_string();
    state
        .kv
        .set(
            &format!("{FORGET_PASSWORD_PREFIX}{token}"),
            &user.id.to_string(),
            state.config.reset_token_ttl,
        )
        .await?;

    // Mail delivery lives outside this service; the link goes to the log
    let link = format!("{}/change-password/{}", state.config.frontend_url, token);
    info!(user_id = user.id, "password reset link: {}", link);

    Ok(Json(true))
}

pub async fn change_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<UserReply, ApiError> {
    if let Some(e) = validate_password("new_password", &req.new_password) {
        return Ok(rejected(StatusCode::BAD_REQUEST, jar, vec![e]));
    }

    let key = format!("{FORGET_PASSWORD_PREFIX}{}", req.token);
    let user_id: Option<UserId> = match state.kv.get(&key).await? {
        Some(raw) => raw
            .parse()
            .inspect_err(|e| warn!("Corrupt reset token value '{}': {}", raw, e))
            .ok(),
        None => None,
    };
    let Some(user_id) = user_id else {
        let errors = vec![FieldError::new("token", "token expired")];
        return Ok(rejected(StatusCode::BAD_REQUEST, jar, errors));
    };

    let password_hash = hash_password(&req.new_password)?;
    let user = state
        .db_call(move |db| {
            if !db.update_password(user_id, &password_hash)? {
                return Ok(None);
            }
            db.get_user_by_id(user_id)
        })
        .await?;

    let Some(user) = user else {
        let errors = vec![FieldError::new("token", "user no longer exists")];
        return Ok(rejected(StatusCode::BAD_REQUEST, jar, errors));
    };

    state.kv.del(&key).await?;
    info!(user_id, "password changed");

    // Log in after reset
    let jar = session::start(&state, jar, user.id).await?;
    Ok((StatusCode::OK, jar, Json(UserResponse::user(convert::user(user)))))
}

/// Hash with Argon2id and a random salt.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Store(format!("password hashing failed: {e}")))
}

fn verify_password(stored: &str, attempt: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| ApiError::Store(format!("stored password hash unreadable: {e}")))?;
    Ok(Argon2::default()
        .verify_password(attempt.as_bytes(), &parsed)
        .is_ok())
}
