use crate::services::access::AccessDenied;
use crate::services::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Maps an error to the status and the message a client is allowed to see.
/// Anything unrecognised is an internal error with no detail.
fn classify(err: &anyhow::Error) -> (StatusCode, String) {
    if let Some(denied) = err.downcast_ref::<AccessDenied>() {
        let status = match denied {
            AccessDenied::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessDenied::Forbidden => StatusCode::FORBIDDEN,
        };
        return (status, denied.to_string());
    }

    if let Some(service) = err.downcast_ref::<ServiceError>() {
        return match service {
            ServiceError::Validation(msg) | ServiceError::Duplicate(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, service.to_string()),
            ServiceError::SlugTaken(_) => (
                StatusCode::CONFLICT,
                "Could not reserve a unique slug, please try again".to_string(),
            ),
            _ => internal(),
        };
    }

    internal()
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn log(status: StatusCode, err: &anyhow::Error) {
    if status.is_server_error() {
        tracing::error!("Application error: {:?}", err);
    } else {
        tracing::debug!(status = status.as_u16(), "Request rejected: {}", err);
    }
}

/// Error type for HTML handlers; renders a plain-text body.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = classify(&self.0);
        log(status, &self.0);
        (status, message).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Error type for JSON handlers; renders `{"error": "..."}`.
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        classify(&self.0).0
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = classify(&self.0);
        log(status, &self.0);
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denials_map_to_auth_statuses() {
        assert_eq!(
            ApiError::from(AccessDenied::Unauthenticated).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AccessDenied::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn service_errors_map_to_client_statuses() {
        assert_eq!(
            ApiError::from(ServiceError::validation("Title and content are required")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ServiceError::NotFound("Post")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(ServiceError::SlugTaken("x".into())).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unknown_errors_are_internal() {
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(ServiceError::Internal(anyhow::anyhow!("boom"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
