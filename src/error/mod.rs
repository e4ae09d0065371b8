pub mod db_error;
pub mod mail_error;
pub mod request_error;
pub mod token_error;
pub mod user_error;

use crate::config::logging::secure_log;
use crate::response::app_response::{ErrorMessage, ErrorResponse};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use db_error::DbError;
use request_error::RequestError;
use token_error::TokenError;
use user_error::UserError;

/// Closed set of failure categories the API reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Conflict,
    Unprocessable,
    NotFound,
    Forbidden,
    Unauthenticated,
    TooManyRequests,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Unified application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Too many requests")]
    RateLimited,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::Db(DbError::from(error))
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Token(TokenError::TokenCreationError(_)) => ErrorKind::Internal,
            AppError::Token(_) => ErrorKind::Unauthenticated,
            AppError::User(error) => match error {
                UserError::UserNotFound => ErrorKind::NotFound,
                UserError::UserAlreadyExists => ErrorKind::Conflict,
                UserError::PasswordRequired | UserError::AlreadyVerified => ErrorKind::BadRequest,
                UserError::IncorrectPassword => ErrorKind::Unprocessable,
                UserError::NotVerified => ErrorKind::Forbidden,
            },
            AppError::Request(_) => ErrorKind::BadRequest,
            AppError::Db(DbError::Duplicate { .. }) => ErrorKind::Conflict,
            AppError::Db(DbError::SomethingWentWrong(_)) => ErrorKind::Internal,
            AppError::RateLimited => ErrorKind::TooManyRequests,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Client-facing message; internal details stay in the logs
    fn public_message(&self) -> String {
        match self {
            AppError::Token(TokenError::TokenCreationError(_)) => "Token generation failed".to_string(),
            AppError::Db(DbError::SomethingWentWrong(_)) => "Database error".to_string(),
            AppError::Db(DbError::Duplicate { .. }) => "Duplicate entry already exists".to_string(),
            AppError::Internal(_) => "Something went wrong!".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            secure_log::secure_error!("Request failed", self);
        }

        let message = self.public_message();
        let error_messages = match &self {
            AppError::Request(error) => error.error_messages(),
            _ => vec![ErrorMessage::new("", message.clone())],
        };

        ErrorResponse::with_error_messages(message, error_messages)
            .with_status(kind.status_code())
            .into_response()
    }
}
