use std::path::PathBuf;

use thiserror::Error;

/// Errors the library surfaces to callers that need to branch on them.
///
/// Orchestration code wraps these in `anyhow::Error` with context.
#[derive(Debug, Error)]
pub enum SeoError {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("missing required columns: {missing:?}. Available columns: {available:?}")]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("unsupported AI provider: {0}")]
    UnsupportedProvider(String),

    #[error("AI request failed: {0}")]
    Ai(String),

    #[error("AI response is not valid JSON: {0}")]
    AiResponseNotJson(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("excel error: {0}")]
    Excel(String),

    #[error("document export error: {0}")]
    Document(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<rust_xlsxwriter::XlsxError> for SeoError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        SeoError::Excel(e.to_string())
    }
}

impl From<calamine::Error> for SeoError {
    fn from(e: calamine::Error) -> Self {
        SeoError::Excel(e.to_string())
    }
}

pub type SeoResult<T> = Result<T, SeoError>;
