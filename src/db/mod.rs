//! SQLite database module for the signing ledger
//!
//! ## Architecture
//!
//! - Schema bootstrap runs once through rusqlite (`schema.rs`)
//! - All reads and writes go through a diesel r2d2 pool
//! - Writes that must commit together share one pooled connection,
//!   carried explicitly by a [`Scope`]
//!
//! ## Tables
//!
//! - `users` - Identity id and display name
//! - `questions` - Question id and text (first writer wins)
//! - `signatures` - Signing events (owner, created_at seconds)
//! - `answers` - Answers linked to a question and a signature

pub mod schema;
pub mod diesel_schema;
pub mod models;
pub mod transaction;
pub mod users;
pub mod questions;
pub mod signatures;
pub mod answers;

use std::path::{Path, PathBuf};
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use rusqlite::Connection as BootstrapConnection;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::LedgerError;
use diesel_schema::{answers as answers_table, questions as questions_table};
use diesel_schema::{signatures as signatures_table, users as users_table};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Per-connection pragmas applied when the pool hands out a connection
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// SQLite database for users, questions, signatures and answers
pub struct SigningDb {
    pool: DbPool,
    path: PathBuf,
}

impl SigningDb {
    /// Open or create the database using config settings
    pub fn from_config(config: &Config) -> Result<Self, LedgerError> {
        Self::open(&config.database_path(), config.pool_size, config.busy_timeout_ms)
    }

    /// Open or create the database at `db_path`
    pub fn open(db_path: &Path, pool_size: u32, busy_timeout_ms: u64) -> Result<Self, LedgerError> {
        info!("Opening SQLite database at {:?}", db_path);

        {
            let conn = BootstrapConnection::open(db_path)
                .map_err(|e| LedgerError::Store(format!("Failed to open SQLite: {}", e)))?;

            // Enable WAL mode for better concurrent read performance
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| LedgerError::Store(format!("Failed to set PRAGMA: {}", e)))?;

            schema::init_schema(&conn)?;
        }

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_millis(busy_timeout_ms.max(1000)))
            .connection_customizer(Box::new(ConnectionOptions { busy_timeout_ms }))
            .build(manager)
            .map_err(|e| LedgerError::Store(format!("Failed to build connection pool: {}", e)))?;

        debug!(pool_size, "Connection pool ready");

        Ok(Self {
            pool,
            path: db_path.to_path_buf(),
        })
    }

    /// Database file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check out a pooled connection
    pub fn conn(&self) -> Result<DbConn, LedgerError> {
        Ok(self.pool.get()?)
    }

    /// Run a read against an independent pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LedgerError>,
    {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Run a write inside `scope` when it is active, independently otherwise
    pub fn with_scope<F, T>(&self, scope: &mut transaction::Scope, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LedgerError>,
    {
        match scope.connection() {
            Some(conn) => f(conn),
            None => self.with_conn(f),
        }
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, LedgerError> {
        self.with_conn(|conn| {
            let users: i64 = users_table::table
                .count()
                .get_result(conn)
                .map_err(|e| LedgerError::Store(format!("Count query failed: {}", e)))?;

            let questions: i64 = questions_table::table
                .count()
                .get_result(conn)
                .map_err(|e| LedgerError::Store(format!("Count query failed: {}", e)))?;

            let signatures: i64 = signatures_table::table
                .count()
                .get_result(conn)
                .map_err(|e| LedgerError::Store(format!("Count query failed: {}", e)))?;

            let answers: i64 = answers_table::table
                .count()
                .get_result(conn)
                .map_err(|e| LedgerError::Store(format!("Count query failed: {}", e)))?;

            Ok(DbStats {
                users: users as u64,
                questions: questions as u64,
                signatures: signatures as u64,
                answers: answers as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub users: u64,
    pub questions: u64,
    pub signatures: u64,
    pub answers: u64,
}

#[cfg(test)]
pub(crate) fn open_test_db() -> (std::sync::Arc<SigningDb>, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let db = SigningDb::open(&dir.path().join("test.db"), 4, 5000).expect("Failed to open test db");
    (std::sync::Arc::new(db), dir)
}

// Re-exports
pub use answers::{AnswerLedger, SqliteAnswerLedger};
pub use questions::{QuestionCatalog, SqliteQuestionCatalog};
pub use signatures::{SignatureLedger, SqliteSignatureLedger};
pub use transaction::{Scope, SqliteTransactionManager, TransactionManager};
pub use users::{SqliteUserStore, UserStore};
