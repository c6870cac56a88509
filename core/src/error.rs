use std::result::Result as StdResult;

use thiserror::Error;

/// Errors surfaced by the cookbook core.
///
/// `Validation` and `Decode` render as the bare notice text so callers can show
/// them to the user as-is.
#[derive(Error, Debug)]
pub enum CookbookError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("Recipe '{0}' not found")]
    NotFound(String),
}

pub type Result<T> = StdResult<T, CookbookError>;

impl From<rusqlite::Error> for CookbookError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CookbookError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Storage(format!("storage task failed: {err}"))
    }
}

impl From<image::ImageError> for CookbookError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(format!("Could not decode image: {err}"))
    }
}

impl From<serde_json::Error> for CookbookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("Malformed JSON: {err}"))
    }
}
