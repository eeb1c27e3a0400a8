use super::handlers;
use super::state::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::public::index))
        .route("/blog/:slug", get(handlers::public::post))
        .route("/profile/:id", get(handlers::public::profile))
        .route("/health", get(handlers::public::health))
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", get(handlers::auth::login_form))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/register", get(handlers::auth::register_form))
        .route("/register", post(handlers::auth::register))
}

pub fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(handlers::dashboard::dashboard))
        .route("/dashboard/new", get(handlers::dashboard::new_post))
        .route("/dashboard/posts", post(handlers::dashboard::create_post))
        .route("/dashboard/edit/:id", get(handlers::dashboard::edit_post))
        .route("/dashboard/edit/:id", post(handlers::dashboard::update_post))
        .route("/dashboard/delete/:id", post(handlers::dashboard::delete_post))
        .route(
            "/dashboard/profile",
            get(handlers::dashboard::edit_profile).post(handlers::dashboard::update_profile),
        )
}

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/register", post(handlers::api::register))
        .route("/api/posts", post(handlers::api::create_post))
        .route(
            "/api/posts/:id",
            get(handlers::api::get_post)
                .put(handlers::api::update_post)
                .delete(handlers::api::delete_post),
        )
        .route("/api/user/profile", put(handlers::api::update_profile))
}
