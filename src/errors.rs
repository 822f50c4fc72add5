use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::validation::FieldErrors;

/// Every failure the API can report. Each variant maps to one HTTP status
/// and one stable `code` string in the response body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        details: FieldErrors,
    },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Reference(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a FieldErrors>,
}

impl AppError {
    pub fn validation(details: FieldErrors) -> Self {
        AppError::Validation {
            message: "Validation failed".to_string(),
            details,
        }
    }

    pub fn unauthenticated() -> Self {
        AppError::Authentication("Authentication required".to_string())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn rate_limited() -> Self {
        AppError::RateLimit("Rate limit exceeded. Please try again later.".to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Reference(_) => "REFERENCE_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Authorization(_) => "AUTHORIZATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND_ERROR",
            AppError::Conflict(_) => "CONFLICT_ERROR",
            AppError::RateLimit(_) => "RATE_LIMIT_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::BadRequest(_)
            | AppError::InvalidState(_)
            | AppError::Reference(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translate a Postgres SQLSTATE into a domain error.
    pub fn from_sqlstate(code: &str, message: &str) -> Self {
        match code {
            "23505" => AppError::Conflict("Resource already exists".to_string()),
            "23503" => AppError::Reference("Referenced resource not found".to_string()),
            "42501" => AppError::Authorization("Access denied".to_string()),
            _ => AppError::Database(message.to_string()),
        }
    }

    /// The message that is safe to return to a caller. Internal details are
    /// only ever written to the log.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) => "Database error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        if self.status().is_server_error() {
            tracing::error!(code = self.code(), "API error: {self}");
        } else {
            tracing::debug!(code = self.code(), "API error: {self}");
        }

        let message = self.public_message();
        let details = match self {
            AppError::Validation { details, .. } => Some(details),
            _ => None,
        };

        HttpResponse::build(self.status()).json(ErrorBody {
            error: &message,
            code: self.code(),
            details,
        })
    }
}

fn sqlstate(err: &DbErr) -> Option<String> {
    let runtime = match err {
        DbErr::Query(e) | DbErr::Exec(e) | DbErr::Conn(e) => e,
        _ => return None,
    };

    match runtime {
        RuntimeErr::SqlxError(e) => e
            .as_database_error()
            .and_then(|d| d.code())
            .map(|c| c.into_owned()),
        _ => None,
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(message) = &err {
            return AppError::NotFound(message.clone());
        }

        if let Some(code) = sqlstate(&err) {
            return AppError::from_sqlstate(&code, &err.to_string());
        }

        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Resource already exists".to_string())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Reference("Referenced resource not found".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(details: FieldErrors) -> Self {
        AppError::validation(details)
    }
}
