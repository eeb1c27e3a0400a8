mod error;
mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use error::{ApiError, AppError};
pub use state::AppState;

use crate::{Config, Database};
use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Builds the full application router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout);

    Router::new()
        .merge(routes::public_routes())
        .merge(routes::auth_routes())
        .merge(routes::dashboard_routes())
        .merge(routes::api_routes())
        .fallback(handlers::public::not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config, db)?);

    let sweeper = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match crate::services::auth::cleanup_expired_sessions(&sweeper.db) {
                Ok(removed) if removed > 0 => {
                    tracing::info!("Session sweeper: removed {} expired session(s)", removed)
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Session sweeper failed: {}", e),
            }
            sweeper.login_limiter.cleanup();
        }
    });

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
