use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use steward_core::StewardError;

// ---------------------------------------------------------------------------
// Internal sentinels for explicit statuses
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 409 through
/// the `anyhow::Error` chain without touching the `StewardError` enum.
#[derive(Debug)]
struct ConflictError(String);

impl std::fmt::Display for ConflictError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ConflictError {}

/// Private sentinel error type used to carry an explicit HTTP 404 through
/// the `anyhow::Error` chain without touching the `StewardError` enum.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StewardError::InvalidRequest(msg.into()).into())
    }

    /// Construct a 409 Conflict error.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(ConflictError(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Check for explicit sentinel types before falling through to StewardError.
        if let Some(c) = self.0.downcast_ref::<ConflictError>() {
            let body = serde_json::json!({ "error": c.0.clone() });
            return (StatusCode::CONFLICT, axum::Json(body)).into_response();
        }
        if let Some(n) = self.0.downcast_ref::<NotFoundError>() {
            let body = serde_json::json!({ "error": n.0.clone() });
            return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
        }

        let status = if let Some(e) = self.0.downcast_ref::<StewardError>() {
            match e {
                StewardError::NotInitialized
                | StewardError::Config(_)
                | StewardError::InvalidRequest(_)
                | StewardError::InvalidRepoName(_) => StatusCode::BAD_REQUEST,
                StewardError::InsightNotFound(_) => StatusCode::NOT_FOUND,
                // The forge rejected our credentials, not the caller's.
                StewardError::Auth(_) => StatusCode::BAD_GATEWAY,
                StewardError::Transient(_)
                | StewardError::ActionFailed(_)
                | StewardError::LearningDegraded(_)
                | StewardError::OutcomeLog(_)
                | StewardError::Io(_)
                | StewardError::Yaml(_)
                | StewardError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
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
