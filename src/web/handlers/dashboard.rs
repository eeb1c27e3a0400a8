use super::{make_context, not_found_page};
use crate::models::{Post, PostInput, UpdateProfile, User};
use crate::services::access::{decide, Actor, Operation};
use crate::services::{auth, posts, ServiceError};
use crate::web::error::AppResult;
use crate::web::extractors::OptionalUser;
use crate::web::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use std::sync::Arc;

fn render_form(
    state: &AppState,
    user: &User,
    post: Option<&Post>,
    input: Option<&PostInput>,
    error: Option<&str>,
    status: StatusCode,
) -> AppResult<Response> {
    let user = Some(user.clone());
    let mut ctx = make_context(state, &user);
    ctx.insert("post", &post);
    ctx.insert("is_new", &post.is_none());
    if let Some(input) = input {
        ctx.insert("title", &input.title);
        ctx.insert("content", &input.content);
        ctx.insert("excerpt", &input.excerpt.clone().unwrap_or_default());
        ctx.insert("cover_image", &input.cover_image.clone().unwrap_or_default());
    } else if let Some(post) = post {
        ctx.insert("title", &post.title);
        ctx.insert("content", &post.content);
        ctx.insert("excerpt", &post.excerpt);
        ctx.insert("cover_image", &post.cover_image);
    }
    if let Some(error) = error {
        ctx.insert("error", error);
    }
    let html = state.templates.render("dashboard/form.html", &ctx)?;
    Ok((status, Html(html)).into_response())
}

/// Loads post `id` and checks that `user` may perform `operation` on it.
fn load_for(
    state: &AppState,
    user: &User,
    id: i64,
    operation: Operation,
) -> AppResult<Result<Post, Response>> {
    let Some(post) = posts::get_post(&state.db, id)? else {
        return Ok(Err(not_found_page(state, &Some(user.clone()))?));
    };

    let actor = Actor::Authenticated(user.id);
    if let Err(denied) = decide(operation, &actor, &post).into_result() {
        tracing::warn!(post_id = id, user_id = user.id, %operation, "Dashboard access denied");
        return Err(denied.into());
    }
    Ok(Ok(post))
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let mine = posts::list_posts_by_author(&state.db, user.id)?;

    let user = Some(user);
    let mut ctx = make_context(&state, &user);
    ctx.insert("posts", &mine);

    let html = state.templates.render("dashboard/index.html", &ctx)?;
    Ok(Html(html).into_response())
}

pub async fn new_post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    render_form(&state, &user, None, None, None, StatusCode::OK)
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Form(form): Form<PostInput>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    match posts::create_post(&state.db, form.clone(), user.id) {
        Ok(_) => Ok(Redirect::to("/dashboard").into_response()),
        Err(ServiceError::Validation(msg)) => render_form(
            &state,
            &user,
            None,
            Some(&form),
            Some(&msg),
            StatusCode::BAD_REQUEST,
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn edit_post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    match load_for(&state, &user, id, Operation::Read)? {
        Ok(post) => render_form(&state, &user, Some(&post), None, None, StatusCode::OK),
        Err(response) => Ok(response),
    }
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i64>,
    Form(form): Form<PostInput>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let post = match load_for(&state, &user, id, Operation::Update)? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    match posts::update_post(&state.db, post.id, form.clone()) {
        Ok(_) => Ok(Redirect::to("/dashboard").into_response()),
        Err(ServiceError::Validation(msg)) => render_form(
            &state,
            &user,
            Some(&post),
            Some(&form),
            Some(&msg),
            StatusCode::BAD_REQUEST,
        ),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let post = match load_for(&state, &user, id, Operation::Delete)? {
        Ok(post) => post,
        Err(response) => return Ok(response),
    };

    posts::delete_post(&state.db, post.id)?;
    Ok(Redirect::to("/dashboard").into_response())
}

fn render_profile_form(
    state: &AppState,
    user: &User,
    input: Option<&UpdateProfile>,
    error: Option<&str>,
    status: StatusCode,
) -> AppResult<Response> {
    let field = |value: Option<&Option<String>>, current: &str| {
        value
            .and_then(|v| v.clone())
            .unwrap_or_else(|| current.to_string())
    };
    let name = field(input.map(|i| &i.name), &user.name);
    let image = field(input.map(|i| &i.image), &user.image);
    let bio = field(input.map(|i| &i.bio), &user.bio);

    let viewer = Some(user.clone());
    let mut ctx = make_context(state, &viewer);
    ctx.insert("name", &name);
    ctx.insert("image", &image);
    ctx.insert("bio", &bio);
    if let Some(error) = error {
        ctx.insert("error", error);
    }
    let html = state.templates.render("dashboard/profile.html", &ctx)?;
    Ok((status, Html(html)).into_response())
}

pub async fn edit_profile(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    render_profile_form(&state, &user, None, None, StatusCode::OK)
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Form(form): Form<UpdateProfile>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let submitted = form.clone();
    match auth::update_profile(&state.db, user.id, form) {
        Ok(updated) => Ok(Redirect::to(&format!("/profile/{}", updated.id)).into_response()),
        Err(ServiceError::Validation(msg)) => render_profile_form(
            &state,
            &user,
            Some(&submitted),
            Some(&msg),
            StatusCode::BAD_REQUEST,
        ),
        Err(e) => Err(e.into()),
    }
}
