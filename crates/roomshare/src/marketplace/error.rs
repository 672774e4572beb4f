use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::repository::RepositoryError;

/// Failure taxonomy shared by every marketplace operation.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not authorized to modify this {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("this listing is no longer active")]
    ListingInactive,
    #[error("payment was not settled: {0}")]
    PaymentDeclined(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl MarketplaceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Maps a repository failure, naming `kind` when the record was missing.
    pub(crate) fn missing(kind: &'static str) -> impl Fn(RepositoryError) -> Self {
        move |err| match err {
            RepositoryError::NotFound => Self::NotFound(kind),
            other => other.into(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            MarketplaceError::NotFound(_) => "not_found",
            MarketplaceError::Forbidden(_) => "forbidden",
            MarketplaceError::Unauthorized(_) => "unauthorized",
            MarketplaceError::Conflict(_) => "conflict",
            MarketplaceError::InvalidInput(_) => "invalid_input",
            MarketplaceError::ListingInactive => "listing_inactive",
            MarketplaceError::PaymentDeclined(_) => "payment_declined",
            MarketplaceError::Storage(_) => "storage_error",
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
            MarketplaceError::InvalidInput(_) | MarketplaceError::ListingInactive => {
                StatusCode::BAD_REQUEST
            }
            MarketplaceError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
            MarketplaceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let message = match &self {
            MarketplaceError::Storage(detail) => {
                error!(%detail, "request failed on storage");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "kind": self.kind(), "message": message }));
        (self.status_code(), body).into_response()
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound => Self::NotFound("record"),
            RepositoryError::ListingInactive => Self::ListingInactive,
            RepositoryError::Unavailable(detail) => Self::Storage(detail),
        }
    }
}

impl From<JsonRejection> for MarketplaceError {
    fn from(value: JsonRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<PathRejection> for MarketplaceError {
    fn from(value: PathRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<QueryRejection> for MarketplaceError {
    fn from(value: QueryRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<MultipartRejection> for MarketplaceError {
    fn from(value: MultipartRejection) -> Self {
        Self::InvalidInput(value.body_text())
    }
}

impl From<MultipartError> for MarketplaceError {
    fn from(value: MultipartError) -> Self {
        Self::InvalidInput(value.body_text())
    }
}
