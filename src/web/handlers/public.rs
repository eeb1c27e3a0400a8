use super::{make_context, not_found_page};
use crate::services::slug::validate_slug;
use crate::services::{auth, posts};
use crate::web::error::AppResult;
use crate::web::extractors::OptionalUser;
use crate::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

const MAX_PAGE: usize = 10000;

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    page: usize,
}

fn default_page() -> usize {
    1
}

fn clamp_page(page: usize) -> usize {
    page.clamp(1, MAX_PAGE)
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Html<String>> {
    let per_page = state.config.content.posts_per_page;
    let page = clamp_page(pagination.page);
    let offset = (page - 1) * per_page;

    let recent = posts::list_recent_posts(&state.db, per_page, offset)?;
    let total = posts::count_posts(&state.db)?;
    let total_pages = (total as usize).div_ceil(per_page).max(1);

    let mut ctx = make_context(&state, &user);
    ctx.insert("posts", &recent);
    ctx.insert("page", &page);
    ctx.insert("total_pages", &total_pages);

    let html = state.templates.render("public/index.html", &ctx)?;
    Ok(Html(html))
}

pub async fn post(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    if !validate_slug(&slug) {
        return not_found_page(&state, &user);
    }

    match posts::get_post_by_slug(&state.db, &slug)? {
        Some(p) => {
            let mut ctx = make_context(&state, &user);
            ctx.insert("post", &p);
            let html = state.templates.render("public/post.html", &ctx)?;
            Ok(Html(html).into_response())
        }
        None => not_found_page(&state, &user),
    }
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let Some(profile) = auth::get_user(&state.db, id)? else {
        return not_found_page(&state, &user);
    };

    let authored = posts::list_posts_by_author(&state.db, profile.id)?;
    let is_own_profile = user.as_ref().is_some_and(|u| u.id == profile.id);

    let mut ctx = make_context(&state, &user);
    ctx.insert("profile", &profile);
    ctx.insert("posts", &authored);
    ctx.insert("is_own_profile", &is_own_profile);

    let html = state.templates.render("public/profile.html", &ctx)?;
    Ok(Html(html).into_response())
}

pub async fn not_found(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    not_found_page(&state, &user)
}

pub async fn health() -> &'static str {
    "ok"
}
