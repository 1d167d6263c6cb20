//! Signature ledger - append-only record of who signed and when

use std::sync::Arc;

use diesel::prelude::*;

use super::diesel_schema::{signatures, users};
use super::models::{NewSignature, SignatureRow, UserRow};
use super::transaction::Scope;
use super::SigningDb;
use crate::entities::Signature;
use crate::error::LedgerError;

pub trait SignatureLedger: Send + Sync {
    fn persist(&self, scope: &mut Scope, signature: &Signature) -> Result<(), LedgerError>;

    /// Point lookup joined with the owner identity
    fn get(&self, id: &uuid::Uuid) -> Result<Option<Signature>, LedgerError>;
}

pub struct SqliteSignatureLedger {
    db: Arc<SigningDb>,
}

impl SqliteSignatureLedger {
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self { db }
    }
}

impl SignatureLedger for SqliteSignatureLedger {
    fn persist(&self, scope: &mut Scope, signature: &Signature) -> Result<(), LedgerError> {
        let id = signature.id.to_string();
        let owner_id = signature.owner.id.to_string();

        self.db.with_scope(scope, |conn| {
            diesel::insert_into(signatures::table)
                .values(&NewSignature {
                    id: &id,
                    owner_id: &owner_id,
                    created_at: signature.created_at.timestamp(),
                })
                .execute(conn)
                .map_err(|e| LedgerError::Store(format!("Signature insert failed: {}", e)))?;
            Ok(())
        })
    }

    fn get(&self, id: &uuid::Uuid) -> Result<Option<Signature>, LedgerError> {
        let row: Option<(SignatureRow, UserRow)> = self.db.with_conn(|conn| {
            signatures::table
                .inner_join(users::table)
                .filter(signatures::id.eq(id.to_string()))
                .select((SignatureRow::as_select(), UserRow::as_select()))
                .first(conn)
                .optional()
                .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))
        })?;

        row.map(|(signature, owner)| signature.into_signature(owner))
            .transpose()
    }
}
