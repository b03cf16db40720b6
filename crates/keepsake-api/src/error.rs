use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use keepsake_types::api::{ErrorBody, FieldIssue};

/// Every way a request can fail. Each variant is terminal for the request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation errors")]
    Validation(Vec<FieldIssue>),

    #[error("{0}")]
    BadRequest(String),

    /// No credential was presented, or it no longer maps to an account.
    #[error("{0}")]
    Unauthenticated(String),

    /// Unknown identifier or wrong password; the two are not distinguished.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid access token")]
    InvalidToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Also used for resources owned by someone else, so their existence
    /// is not revealed.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Storage or signing failure. Logged, never retried.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("Unauthorized request".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_)
            | Self::InvalidCredentials
            | Self::InvalidToken
            | Self::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Validation(issues) => ErrorBody {
                message: "Validation errors".into(),
                errors: Some(issues),
            },
            Self::Internal(err) => {
                error!("Internal error: {:#}", err);
                ErrorBody {
                    message: "Internal server error".into(),
                    errors: None,
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                errors: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
