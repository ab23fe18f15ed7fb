use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// CoreError
///
/// Every failure a core operation can produce. Operations fail fast with one of
/// these kinds and never apply a partial mutation. The HTTP layer renders each
/// kind to its own status code via `IntoResponse`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The Authorization Engine denied the action.
    #[error("{0}")]
    Forbidden(String),

    /// Duplicate reaction, duplicate username, or un-banning a user who is not banned.
    #[error("{0}")]
    Conflict(String),

    /// A mutation was attempted on a locked publication.
    #[error("{0}")]
    Locked(String),

    /// A required field is missing or malformed.
    #[error("{0}")]
    ValidationFailed(String),

    /// Missing, expired or otherwise invalid credential.
    #[error("authentication required")]
    Unauthenticated,

    /// Unclassified failure (database, storage, hashing). Never shown to clients verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn locked(msg: impl Into<String>) -> Self {
        Self::Locked(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn internal(msg: impl ToString) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Locked(_) => StatusCode::LOCKED,
            CoreError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {:?}", err);
        CoreError::Internal(err.to_string())
    }
}

/// Classified errors surface their own message; `Internal` is logged and masked
/// so that database or storage details never leak to the client.
impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            CoreError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
