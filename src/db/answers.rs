//! Answer ledger - append-only answers keyed by signature

use std::sync::Arc;

use diesel::prelude::*;
use uuid::Uuid;

use super::diesel_schema::{answers, questions};
use super::models::{AnswerRow, NewAnswer, QuestionRow};
use super::transaction::Scope;
use super::SigningDb;
use crate::entities::{Answer, PendingAnswer};
use crate::error::LedgerError;

pub trait AnswerLedger: Send + Sync {
    /// Write each answer under `signature_id`, minting a fresh id per row
    fn persist(
        &self,
        scope: &mut Scope,
        signature_id: &Uuid,
        answers: &[PendingAnswer],
    ) -> Result<(), LedgerError>;

    /// All answers for a signature, each joined with its question.
    /// Order is whatever the store returns.
    fn get(&self, signature_id: &Uuid) -> Result<Vec<Answer>, LedgerError>;
}

pub struct SqliteAnswerLedger {
    db: Arc<SigningDb>,
}

impl SqliteAnswerLedger {
    pub fn new(db: Arc<SigningDb>) -> Self {
        Self { db }
    }
}

impl AnswerLedger for SqliteAnswerLedger {
    fn persist(
        &self,
        scope: &mut Scope,
        signature_id: &Uuid,
        answers: &[PendingAnswer],
    ) -> Result<(), LedgerError> {
        let signature_id = signature_id.to_string();

        self.db.with_scope(scope, |conn| {
            for answer in answers {
                let id = Uuid::new_v4().to_string();
                let question_id = answer.question_id.to_string();
                diesel::insert_into(answers::table)
                    .values(&NewAnswer {
                        id: &id,
                        question_id: &question_id,
                        text: &answer.answer,
                        signature_id: &signature_id,
                    })
                    .execute(conn)
                    .map_err(|e| LedgerError::Store(format!("Answer insert failed: {}", e)))?;
            }
            Ok(())
        })
    }

    fn get(&self, signature_id: &Uuid) -> Result<Vec<Answer>, LedgerError> {
        let rows: Vec<(AnswerRow, QuestionRow)> = self.db.with_conn(|conn| {
            answers::table
                .inner_join(questions::table)
                .filter(answers::signature_id.eq(signature_id.to_string()))
                .select((AnswerRow::as_select(), QuestionRow::as_select()))
                .load(conn)
                .map_err(|e| LedgerError::Store(format!("Query failed: {}", e)))
        })?;

        rows.into_iter()
            .map(|(answer, question)| answer.into_answer(question))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn test_answer_requires_known_question() {
        let (db, _dir) = open_test_db();
        let ledger = SqliteAnswerLedger::new(db);

        let err = ledger
            .persist(
                &mut Scope::detached(),
                &Uuid::new_v4(),
                &[PendingAnswer {
                    question_id: Uuid::new_v4(),
                    answer: "orphan".into(),
                }],
            )
            .unwrap_err();

        assert!(matches!(err, LedgerError::Store(_)));
    }

    #[test]
    fn test_get_unknown_signature_is_empty() {
        let (db, _dir) = open_test_db();
        let ledger = SqliteAnswerLedger::new(db);

        assert!(ledger.get(&Uuid::new_v4()).unwrap().is_empty());
    }
}
