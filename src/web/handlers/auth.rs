use super::make_context;
use crate::models::RegisterUser;
use crate::services::{auth, ServiceError};
use crate::web::error::AppResult;
use crate::web::extractors::{OptionalUser, SESSION_COOKIE};
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration;

pub(crate) fn session_cookie(token: String, lifetime_days: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(Duration::days(lifetime_days))
        .build()
}

fn render_form(
    state: &AppState,
    template: &str,
    status: StatusCode,
    error: Option<&str>,
    email: &str,
    name: &str,
) -> AppResult<Response> {
    let mut ctx = make_context(state, &None);
    if let Some(error) = error {
        ctx.insert("error", error);
    }
    ctx.insert("email", email);
    ctx.insert("name", name);
    let html = state.templates.render(template, &ctx)?;
    Ok((status, Html(html)).into_response())
}

pub async fn login_form(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render_form(&state, "auth/login.html", StatusCode::OK, None, "", "")
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let key = auth::normalize_email(&form.email);

    if !state.login_limiter.check(&key) {
        tracing::warn!("Login locked out for {}", key);
        return render_form(
            &state,
            "auth/login.html",
            StatusCode::TOO_MANY_REQUESTS,
            Some("Too many failed attempts. Try again later."),
            &form.email,
            "",
        );
    }

    match auth::authenticate(&state.db, &form.email, &form.password)? {
        Some(user) => {
            state.login_limiter.clear(&key);
            let lifetime = state.config.auth.session_lifetime_days;
            let token = auth::create_session(&state.db, user.id, lifetime)?;
            tracing::info!(user_id = user.id, "User logged in");
            Ok((jar.add(session_cookie(token, lifetime)), Redirect::to("/dashboard")).into_response())
        }
        None => {
            state.login_limiter.record_attempt(&key);
            tracing::warn!("Failed login for {}", key);
            render_form(
                &state,
                "auth/login.html",
                StatusCode::UNAUTHORIZED,
                Some("Invalid email or password"),
                &form.email,
                "",
            )
        }
    }
}

pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> AppResult<Response> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = auth::delete_session(&state.db, cookie.value()) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();

    Ok((jar.remove(cookie), Redirect::to("/login")).into_response())
}

pub async fn register_form(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
) -> AppResult<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    render_form(&state, "auth/register.html", StatusCode::OK, None, "", "")
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<RegisterUser>,
) -> AppResult<Response> {
    match auth::register(&state.db, &form, state.config.auth.min_password_length) {
        Ok(user) => {
            let lifetime = state.config.auth.session_lifetime_days;
            let token = auth::create_session(&state.db, user.id, lifetime)?;
            Ok((jar.add(session_cookie(token, lifetime)), Redirect::to("/dashboard")).into_response())
        }
        Err(ServiceError::Validation(msg)) | Err(ServiceError::Duplicate(msg)) => render_form(
            &state,
            "auth/register.html",
            StatusCode::BAD_REQUEST,
            Some(&msg),
            &form.email,
            &form.name,
        ),
        Err(e) => Err(e.into()),
    }
}
