use std::sync::OnceLock;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::SqlErr;
use serde::Serialize;
use thiserror::Error;

use crate::{media::MediaError, models::OrderStatus, response::ApiResponse};

static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Include internal error details in response bodies. Set once at startup.
pub fn expose_error_details(enabled: bool) {
    let _ = EXPOSE_DETAILS.set(enabled);
}

fn details_exposed() -> bool {
    EXPOSE_DETAILS.get().copied().unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid order status '{0}'")]
    InvalidStatus(String),

    #[error("You have already reviewed this product for this order")]
    DuplicateReview,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("Cannot change order status from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Media upload failed")]
    Media(#[from] MediaError),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorData {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_fields: Vec<String>,
}

impl AppError {
    pub fn is_unique_violation(&self) -> bool {
        match self {
            AppError::OrmError(err) => {
                matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
            }
            AppError::DbError(sqlx::Error::Database(err)) => err.is_unique_violation(),
            _ => false,
        }
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        if self.is_unique_violation() {
            return (StatusCode::CONFLICT, "CONFLICT");
        }
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::MissingFields(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELDS"),
            AppError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
            AppError::DuplicateReview => (StatusCode::BAD_REQUEST, "DUPLICATE_REVIEW"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::IllegalTransition { .. } => {
                (StatusCode::CONFLICT, "ILLEGAL_STATUS_TRANSITION")
            }
            AppError::Media(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MEDIA_ERROR"),
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            AppError::Media(err) => Some(err.to_string()),
            AppError::DbError(err) => Some(err.to_string()),
            AppError::OrmError(err) => Some(err.to_string()),
            AppError::Internal(err) => Some(format!("{err:#}")),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status == StatusCode::CONFLICT && self.is_unique_violation() {
            "Resource already exists".to_string()
        } else {
            self.to_string()
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, code, "request failed");
        }

        let error = if details_exposed() { self.detail() } else { None };
        let missing_fields = match self {
            AppError::MissingFields(fields) => fields,
            _ => Vec::new(),
        };

        let data = (error.is_some() || !missing_fields.is_empty()).then_some(ErrorData {
            error,
            missing_fields,
        });

        let body = ApiResponse::failure(message, code, data);
        (status, axum::Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
