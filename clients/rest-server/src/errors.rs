use std::collections::BTreeMap;

use actix_web::{
    error::BlockingError,
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use database::database::{
    request_manager::RequestManagerError,
    table::{filter::ValidationError, table::ApplyErrors},
};
use serde_json::json;
use thiserror::Error;

/// Messages per offending field, rendered as `{"field": ["message", ...]}`
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const BASIC_REALM: &str = "Basic realm=\"api\"";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("{0}")]
    AuthenticationFailed(&'static str),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Not found.")]
    NotFound,

    #[error("Invalid page.")]
    InvalidPage,

    #[error("JSON parse error - {0}")]
    JsonParse(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid input: {0:?}")]
    Validation(FieldErrors),

    #[error("{0}")]
    DatabaseUnavailable(RequestManagerError),

    #[error("A server error occurred.")]
    Internal,
}

impl ApiError {
    pub fn field(field: &str, message: &str) -> Self {
        ApiError::Validation(BTreeMap::from([(
            field.to_string(),
            vec![message.to_string()],
        )]))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated | ApiError::AuthenticationFailed(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::InvalidPage => StatusCode::NOT_FOUND,
            ApiError::JsonParse(_) | ApiError::BadRequest(_) | ApiError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());

        if self.status_code() == StatusCode::UNAUTHORIZED {
            response.insert_header((header::WWW_AUTHENTICATE, BASIC_REALM));
        }

        match self {
            ApiError::Validation(errors) => response.json(errors),
            _ => response.json(json!({ "detail": self.to_string() })),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::field(error.field, &error.message)
    }
}

impl From<BlockingError> for ApiError {
    fn from(error: BlockingError) -> Self {
        log::error!("Blocking task failed: {}", error);
        ApiError::Internal
    }
}

impl From<RequestManagerError> for ApiError {
    fn from(error: RequestManagerError) -> Self {
        match error {
            RequestManagerError::TransactionRollback(apply_error) => match apply_error {
                ApplyErrors::CannotUpdateDoesNotExist(_)
                | ApplyErrors::CannotDeleteDoesNotExist(_) => ApiError::NotFound,
                ApplyErrors::UniqueConstraintViolation(_) => {
                    ApiError::field("username", "A user with that username already exists.")
                }
                ApplyErrors::NotNullConstraintViolation(field) => {
                    ApiError::field(&field, "This field may not be null.")
                }
            },
            RequestManagerError::DatabaseTimeout | RequestManagerError::DatabaseDisconnected => {
                log::error!("Database request failed: {}", error);
                ApiError::DatabaseUnavailable(error)
            }
        }
    }
}
