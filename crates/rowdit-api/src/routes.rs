use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;
use crate::{auth, posts, votes};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/change-password", post(auth::change_password))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/vote", post(votes::vote))
        .with_state(state)
}

async fn hello() -> &'static str {
    "hello"
}
