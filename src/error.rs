use actix_web::{http::StatusCode, ResponseError};
use thiserror::Error;

use crate::forms::FieldErrors;
use crate::response::response_from_error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid form input")]
    Validation {
        errors: FieldErrors,
        form: serde_json::Value,
    },
    #[error("please login first")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("system_exception")]
    System,
}

impl AppError {
    pub fn validation(errors: FieldErrors, form: serde_json::Value) -> Self {
        Self::Validation { errors, form }
    }

    pub fn need_login() -> Self {
        Self::Unauthorized
    }

    pub fn tea_not_found() -> Self {
        Self::NotFound("tea not found".to_string())
    }

    pub fn param_error(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn method_not_allowed() -> Self {
        Self::BadRequest("method not allowed".to_string())
    }

    pub fn system_exception() -> Self {
        Self::System
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        log::error!("database error: {}", err);
        Self::System
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::System => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        response_from_error(self)
    }
}
