use axum::{Json, http::StatusCode, response::IntoResponse};
use hnf1b_common::{error::PageError, views::ApiErrorResponse};
use hnf1b_db::{pagination::PaginateError, storage::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    InternalAnyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Page(_) => StatusCode::BAD_REQUEST,
            Self::Storage(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::InternalAnyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PaginateError> for ApiError {
    fn from(err: PaginateError) -> Self {
        match err {
            PaginateError::Request(e) => Self::Page(e),
            PaginateError::Storage(e) => Self::Storage(e),
        }
    }
}

impl From<&ApiError> for ApiErrorResponse {
    fn from(err: &ApiError) -> Self {
        let (error, detail) = match err {
            ApiError::NotFound => ("NotFound", "The requested resource was not found.".into()),
            ApiError::Page(pe) => (pe.kind(), pe.to_string()),
            ApiError::Storage(StoreError::Unavailable(_)) => (
                "StorageUnavailable",
                "The database is temporarily unavailable. Please try again later.".into(),
            ),
            ApiError::Storage(_) | ApiError::InternalAnyhow(_) => (
                "InternalError",
                "Something went wrong on our end. Please try again later.".into(),
            ),
        };

        ApiErrorResponse {
            error: error.into(),
            detail,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("Error returned by handler: {self}");
        } else {
            tracing::debug!("Rejected request: {self}");
        }

        (status_code, Json(ApiErrorResponse::from(&self))).into_response()
    }
}
