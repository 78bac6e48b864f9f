use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, AppError>;

/// Errors safe to describe to the caller. The semantic query surface never
/// returns a body on these — the upstream protocol's "400 with empty body"
/// convention — so the text is for logs only.
#[derive(Debug)]
pub enum PublicError {
    BadRequest(String),
}

/// Errors that must not leak internals to the caller.
#[derive(Debug)]
pub enum PrivateError {
    Db(sqlx::Error),
}

#[derive(Debug)]
pub enum AppError {
    Public(PublicError),
    Private(PrivateError),
}

impl From<PublicError> for AppError {
    fn from(e: PublicError) -> Self {
        AppError::Public(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Private(PrivateError::Db(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Public(PublicError::BadRequest(msg)) => {
                error!("ERROR ->> bad request: {msg}");
                (StatusCode::BAD_REQUEST, ()).into_response()
            }
            AppError::Private(inner) => {
                error!("ERROR ->> internal error: {inner:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, ()).into_response()
            }
        }
    }
}
