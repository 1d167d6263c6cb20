//! Transactional scope (unit of work)
//!
//! A [`Scope`] owns one pooled connection with an open transaction. Stores
//! that take a `&mut Scope` write through that connection, so everything
//! they do becomes visible at commit and disappears on rollback. A detached
//! scope carries no connection and stores fall back to independent writes.
//!
//! Dropping an active scope rolls it back, so a connection never returns to
//! the pool mid-transaction.

use std::sync::Arc;

use diesel::connection::{AnsiTransactionManager, TransactionManager as DieselTransactionManager};
use diesel::sqlite::SqliteConnection;
use tracing::{debug, warn};

use super::{DbConn, SigningDb};
use crate::error::LedgerError;

/// Explicit unit-of-work handle
pub struct Scope {
    conn: Option<DbConn>,
}

impl Scope {
    /// A scope with no active handle
    pub fn detached() -> Self {
        Self { conn: None }
    }

    /// True while a transaction is open on this scope
    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    pub(crate) fn connection(&mut self) -> Option<&mut SqliteConnection> {
        self.conn.as_deref_mut()
    }

    fn take(&mut self) -> Option<DbConn> {
        self.conn.take()
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope").field("active", &self.is_active()).finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(mut conn) = self.take() {
            warn!("Active scope dropped without commit, rolling back");
            rollback_conn(&mut conn);
        }
    }
}

/// Begin/commit/rollback lifecycle for scopes
pub trait TransactionManager: Send + Sync {
    /// Start a unit of work
    fn begin(&self) -> Result<Scope, LedgerError>;

    /// Commit and finalize. No-op on a finalized or detached scope.
    fn commit(&self, scope: &mut Scope) -> Result<(), LedgerError>;

    /// Best-effort rollback. No-op on a finalized or detached scope.
    fn rollback(&self, scope: &mut Scope);
}

/// Transaction manager over the SQLite pool
pub struct SqliteTransactionManager {
    db: Arc<SigningDb>,
}

impl SqliteTransactionManager {
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self { db }
    }
}

impl TransactionManager for SqliteTransactionManager {
    fn begin(&self) -> Result<Scope, LedgerError> {
        let mut conn = self.db.conn()?;

        // IMMEDIATE takes the write lock up front so concurrent scopes queue
        // on busy_timeout instead of failing on lock upgrade.
        AnsiTransactionManager::begin_transaction_sql(&mut *conn, "BEGIN IMMEDIATE")
            .map_err(|e| LedgerError::Store(format!("Failed to begin transaction: {}", e)))?;

        debug!("Scope started");
        Ok(Scope { conn: Some(conn) })
    }

    fn commit(&self, scope: &mut Scope) -> Result<(), LedgerError> {
        let Some(mut conn) = scope.take() else {
            return Ok(());
        };

        match AnsiTransactionManager::commit_transaction(&mut *conn) {
            Ok(()) => {
                debug!("Scope committed");
                Ok(())
            }
            Err(e) => {
                rollback_conn(&mut conn);
                Err(LedgerError::Store(format!("Failed to commit transaction: {}", e)))
            }
        }
    }

    fn rollback(&self, scope: &mut Scope) {
        if let Some(mut conn) = scope.take() {
            rollback_conn(&mut conn);
        }
    }
}

fn rollback_conn(conn: &mut DbConn) {
    // A failed commit may already have been rolled back by the driver.
    if AnsiTransactionManager::transaction_manager_status_mut(&mut **conn)
        .transaction_depth()
        .ok()
        .flatten()
        .is_none()
    {
        return;
    }

    match AnsiTransactionManager::rollback_transaction(&mut **conn) {
        Ok(()) => debug!("Scope rolled back"),
        Err(e) => warn!(error = %e, "Rollback failed, leaving recovery to the store"),
    }
}
