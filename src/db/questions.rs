//! Question catalog - insert-if-absent only

use std::sync::Arc;

use diesel::prelude::*;
use tracing::debug;

use super::diesel_schema::questions;
use super::models::{NewQuestion, QuestionRow};
use super::transaction::Scope;
use super::SigningDb;
use crate::entities::Question;
use crate::error::LedgerError;

pub trait QuestionCatalog: Send + Sync {
    /// Upsert-ignore each question. Returns how many were new.
    fn persist(&self, scope: &mut Scope, questions: &[Question]) -> Result<usize, LedgerError>;

    fn get(&self, id: &uuid::Uuid) -> Result<Option<Question>, LedgerError>;
}

pub struct SqliteQuestionCatalog {
    db: Arc<SigningDb>,
}

impl SqliteQuestionCatalog {
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self { db }
    }
}

impl QuestionCatalog for SqliteQuestionCatalog {
    fn persist(&self, scope: &mut Scope, questions: &[Question]) -> Result<usize, LedgerError> {
        self.db.with_scope(scope, |conn| {
            let mut inserted = 0;
            for question in questions {
                let id = question.id.to_string();
                inserted += diesel::insert_or_ignore_into(questions::table)
                    .values(&NewQuestion {
                        id: &id,
                        text: &question.text,
                    })
                    .execute(conn)
                    .map_err(|e| LedgerError::Store(format!("Question insert failed: {}", e)))?;
            }
            debug!(total = questions.len(), inserted, "Questions upserted");
            Ok(inserted)
        })
    }

    fn get(&self, id: &uuid::Uuid) -> Result<Option<Question>, LedgerError> {
        let row: Option<QuestionRow> = self.db.with_conn(|conn| {
            questions::table
                .filter(questions::id.eq(id.to_string()))
                .select(QuestionRow::as_select())
                .first(conn)
                .optional()
                .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))
        })?;

        row.map(QuestionRow::into_question).transpose()
    }
}
