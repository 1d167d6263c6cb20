//! Signing Ledger - atomic question/answer signing with owned retrieval
//!
//! An authenticated identity submits a bundle of question/answer pairs as
//! one signing event and later reads back the answers of its own events.
//!
//! ## Architecture
//!
//! - **http**: hyper boundary, bearer-token auth, body validation
//! - **services**: sign and fetch orchestration
//! - **db**: SQLite stores plus the explicit transactional [`db::Scope`]
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/signing-ledger/
//! ├── signatures.db          # users, questions, signatures, answers
//! └── config.toml            # Configuration
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod http;
pub mod services;

// Re-exports
pub use auth::JwtValidator;
pub use config::Config;
pub use db::SigningDb;
pub use error::LedgerError;
pub use http::HttpServer;
pub use services::Services;
