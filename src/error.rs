//! Error types for signing-ledger
//!
//! A single closed enum covers both the core (sign/fetch) and the HTTP
//! boundary. Callers branch on the variant, never on message text.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Signature (or other required record) absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requesting identity does not own the signature
    #[error("Access forbidden to signature {signature_id}")]
    AccessForbidden { signature_id: String },

    /// Question/answer bijection broken or malformed identifiers
    #[error("Validation error: {0}")]
    Validation(String),

    /// Any persistence failure: connectivity, constraints, begin/commit
    #[error("Store error: {0}")]
    Store(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessForbidden { .. } => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<diesel::result::Error> for LedgerError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Store(format!("Database: {}", err))
    }
}

impl From<diesel::r2d2::PoolError> for LedgerError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::Store(format!("Connection pool: {}", err))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(format!("Schema bootstrap: {}", err))
    }
}
