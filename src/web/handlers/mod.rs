pub mod api;
pub mod auth;
pub mod dashboard;
pub mod public;

use crate::models::User;
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tera::Context;

/// Template context shared by every page: site settings and the viewer.
pub(crate) fn make_context(state: &AppState, user: &Option<User>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("site", &state.config.site);
    ctx.insert("user", user);
    ctx.insert("excerpt_length", &state.config.content.excerpt_length);
    ctx.insert("version", env!("CARGO_PKG_VERSION"));
    ctx
}

pub(crate) fn not_found_page(state: &AppState, user: &Option<User>) -> AppResult<Response> {
    let ctx = make_context(state, user);
    let html = state.templates.render("public/404.html", &ctx)?;
    Ok((StatusCode::NOT_FOUND, Html(html)).into_response())
}
