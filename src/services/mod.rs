//! Service layer for signing-ledger
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (sign / fetch orchestration)
//!     ↓
//! Store Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod sign_service;
pub mod fetch_service;

// Re-exports
pub use fetch_service::{FetchInput, FetchOutput, FetchService};
pub use sign_service::{SignInput, SignOutput, SignService};

use std::sync::Arc;

use crate::db::{
    AnswerLedger, QuestionCatalog, SignatureLedger, SigningDb, SqliteAnswerLedger,
    SqliteQuestionCatalog, SqliteSignatureLedger, SqliteTransactionManager, SqliteUserStore,
    TransactionManager, UserStore,
};

/// Service container for dependency injection
pub struct Services {
    pub sign: Arc<SignService>,
    pub fetch: Arc<FetchService>,
}

impl Services {
    /// Create all services over a shared database
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self::from_parts(
            Arc::new(SqliteUserStore::new(db.clone())),
            Arc::new(SqliteQuestionCatalog::new(db.clone())),
            Arc::new(SqliteAnswerLedger::new(db.clone())),
            Arc::new(SqliteSignatureLedger::new(db.clone())),
            Arc::new(SqliteTransactionManager::new(db)),
        )
    }

    /// Create services from explicit store implementations
    pub fn from_parts(
        users: Arc<dyn UserStore>,
        questions: Arc<dyn QuestionCatalog>,
        answers: Arc<dyn AnswerLedger>,
        signatures: Arc<dyn SignatureLedger>,
        tm: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            sign: Arc::new(SignService::new(
                users,
                questions,
                answers.clone(),
                signatures.clone(),
                tm,
            )),
            fetch: Arc::new(FetchService::new(answers, signatures)),
        }
    }
}
