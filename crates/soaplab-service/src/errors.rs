use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diesel::result::Error as DieselError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::validation::ValidationError;

/// Failures reported by the content store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Content store schema is out of date: {0}")]
    SchemaOutOfDate(String),

    #[error("Database error: {0}")]
    Database(DieselError),

    #[error("Stored row could not be decoded: {0}")]
    CorruptRow(String),

    #[error("Database connection is unavailable")]
    ConnectionPoisoned,
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        if let DieselError::DatabaseError(_, ref info) = err {
            let message = info.message();
            if message.contains("no such column") || message.contains("no such table") {
                return StoreError::SchemaOutOfDate(message.to_string());
            }
        }
        StoreError::Database(err)
    }
}

/// Outcome kinds of the news query and mutation layers.
#[derive(Error, Debug)]
pub enum NewsError {
    #[error("News storage needs a migration: {0}")]
    SchemaOutOfDate(String),

    #[error("News item {0} does not exist")]
    NotFound(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for NewsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SchemaOutOfDate(detail) => NewsError::SchemaOutOfDate(detail),
            other => NewsError::Store(other),
        }
    }
}

/// Rejections produced by the authorization gate.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer credential")]
    MissingCredential,

    #[error("Invalid or expired credential")]
    InvalidCredential,

    #[error("No profile record for user {0}")]
    ProfileMissing(Uuid),

    #[error("Admin role required")]
    Forbidden(Uuid),

    #[error("Identity service unavailable: {0}")]
    IdentityUnavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    News(#[from] NewsError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::News(NewsError::SchemaOutOfDate(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "schema_out_of_date")
            }
            ApiError::News(NewsError::NotFound(_)) | ApiError::NotFound => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            ApiError::News(NewsError::Validation(_)) | ApiError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "validation_failed")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Auth(AuthError::MissingCredential | AuthError::InvalidCredential) => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            ApiError::Auth(AuthError::ProfileMissing(_)) => {
                (StatusCode::FORBIDDEN, "profile_missing")
            }
            ApiError::Auth(AuthError::Forbidden(_)) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Auth(AuthError::IdentityUnavailable(_)) => {
                (StatusCode::BAD_GATEWAY, "identity_unavailable")
            }
            ApiError::Store(StoreError::SchemaOutOfDate(_))
            | ApiError::Auth(AuthError::Store(StoreError::SchemaOutOfDate(_))) => {
                (StatusCode::SERVICE_UNAVAILABLE, "schema_out_of_date")
            }
            ApiError::News(NewsError::Store(_))
            | ApiError::Auth(AuthError::Store(_))
            | ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                // Log the detailed error but don't expose it to the client
                error!(error = %self, "Content store error occurred");
                "Internal server error".to_string()
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                warn!(error = %self, "Content store schema needs a migration");
                "News storage needs to be set up before it can be used".to_string()
            }
            StatusCode::BAD_GATEWAY => {
                error!(error = %self, "Identity service call failed");
                "Authentication service unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
