use crate::models::{Post, PostInput, RegisterUser, RegisteredUser, UpdateProfile};
use crate::services::access::{decide, AccessDenied, Actor, Operation};
use crate::services::{auth, posts, ServiceError};
use crate::web::error::ApiResult;
use crate::web::extractors::{CurrentUser, OptionalUser};
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::sync::Arc;

/// Checks `operation` against the post's owner, logging denials.
fn authorize(viewer: &OptionalUser, operation: Operation, post: &Post) -> Result<(), AccessDenied> {
    let actor = viewer.actor();
    let result = decide(operation, &actor, post).into_result();
    if let Err(denied) = &result {
        tracing::warn!(
            post_id = post.id,
            user_id = ?actor.user_id(),
            %operation,
            "Post access denied: {}",
            denied
        );
    }
    result
}

/// Mutations need a session before anything about the post is revealed.
fn require_session(viewer: &OptionalUser) -> Result<(), AccessDenied> {
    match viewer.actor() {
        Actor::Anonymous => Err(AccessDenied::Unauthenticated),
        Actor::Authenticated(_) => Ok(()),
    }
}

fn load_post(state: &AppState, id: i64) -> ApiResult<Post> {
    let post = posts::get_post(&state.db, id)?;
    post.ok_or_else(|| ServiceError::NotFound("Post").into())
}

/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterUser>,
) -> ApiResult<Response> {
    let user = auth::register(&state.db, &input, state.config.auth.min_password_length)?;
    let body = json!({
        "message": "User registered successfully",
        "user": RegisteredUser::from(&user),
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<PostInput>,
) -> ApiResult<Response> {
    let post = posts::create_post(&state.db, input, user.id)?;
    let body = json!({
        "message": "Post created",
        "post": post,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let post = load_post(&state, id)?;
    authorize(&viewer, Operation::Read, &post)?;
    Ok(Json(json!({ "post": post })))
}

/// PUT /api/posts/:id
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
    Json(input): Json<PostInput>,
) -> ApiResult<Json<serde_json::Value>> {
    require_session(&viewer)?;
    let valid = posts::validate(input)?;
    let post = load_post(&state, id)?;
    authorize(&viewer, Operation::Update, &post)?;
    let post = posts::update_valid_post(&state.db, post.id, &valid)?;
    Ok(Json(json!({
        "message": "Post updated",
        "post": post,
    })))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    viewer: OptionalUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    require_session(&viewer)?;
    let post = load_post(&state, id)?;
    authorize(&viewer, Operation::Delete, &post)?;
    posts::delete_post(&state.db, post.id)?;
    Ok(Json(json!({ "message": "Post deleted" })))
}

/// PUT /api/user/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateProfile>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = auth::update_profile(&state.db, user.id, input)?;
    Ok(Json(json!({
        "message": "Profile updated",
        "user": user,
    })))
}
