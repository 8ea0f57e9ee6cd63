use thiserror::Error;

use crate::cursor::CursorError;

/// Client-input errors raised while validating a list request. All of them
/// are detected before any storage call is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid pagination parameters: {0}")]
    InvalidPaginationParameters(String),

    #[error("Unknown filter field: {0}")]
    UnknownFilterField(String),

    #[error("Unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("Invalid filter on '{field}': {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("Invalid sort: {0}")]
    InvalidSort(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
}

impl PageError {
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidPaginationParameters(reason.into())
    }

    pub fn invalid_filter(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_cursor(reason: impl Into<String>) -> Self {
        Self::InvalidCursor(reason.into())
    }

    /// The stable error kind reported in the `error` field of responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PageError::InvalidPaginationParameters(_) => "InvalidPaginationParameters",
            PageError::UnknownFilterField(_) => "UnknownFilterField",
            PageError::UnknownSortField(_) => "UnknownSortField",
            PageError::InvalidFilter { .. } => "InvalidFilter",
            PageError::InvalidSort(_) => "InvalidSort",
            PageError::InvalidCursor(_) => "InvalidCursor",
        }
    }
}

impl From<CursorError> for PageError {
    fn from(err: CursorError) -> Self {
        Self::InvalidCursor(err.to_string())
    }
}
