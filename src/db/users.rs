//! Identity store
//!
//! Writes here never join a scope: a registered identity survives even when
//! the signing attempt that introduced it fails.

use std::sync::Arc;

use diesel::prelude::*;

use super::diesel_schema::users;
use super::models::{NewUser, UserRow};
use super::SigningDb;
use crate::entities::User;
use crate::error::LedgerError;

pub trait UserStore: Send + Sync {
    /// Point lookup; `None` when the identity has never been seen
    fn get(&self, id: &uuid::Uuid) -> Result<Option<User>, LedgerError>;

    /// Idempotent create; an existing id is left untouched
    fn persist(&self, user: &User) -> Result<(), LedgerError>;
}

pub struct SqliteUserStore {
    db: Arc<SigningDb>,
}

impl SqliteUserStore {
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self { db }
    }
}

impl UserStore for SqliteUserStore {
    fn get(&self, id: &uuid::Uuid) -> Result<Option<User>, LedgerError> {
        let row: Option<UserRow> = self.db.with_conn(|conn| {
            users::table
                .filter(users::id.eq(id.to_string()))
                .select(UserRow::as_select())
                .first(conn)
                .optional()
                .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))
        })?;

        row.map(UserRow::into_user).transpose()
    }

    fn persist(&self, user: &User) -> Result<(), LedgerError> {
        let id = user.id.to_string();
        self.db.with_conn(|conn| {
            diesel::insert_or_ignore_into(users::table)
                .values(&NewUser {
                    id: &id,
                    username: &user.username,
                })
                .execute(conn)
                .map_err(|e| LedgerError::Store(format!("Insert failed: {}", e)))?;
            Ok(())
        })
    }
}
