//! Sign service - the atomic signing workflow
//!
//! 1. Ensure the identity exists (outside any scope, never rolled back)
//! 2. Check the question/answer id bijection
//! 3. Begin a scope
//! 4. Upsert questions, 5. create the signature, 6. persist answers
//! 7. Commit, or roll back on the first failure of 4-6

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{AnswerLedger, QuestionCatalog, Scope, SignatureLedger, TransactionManager, UserStore};
use crate::entities::{PendingAnswer, Question, Signature, User};
use crate::error::LedgerError;

/// Signing request; both maps are keyed by question id
#[derive(Debug, Clone)]
pub struct SignInput {
    pub user: User,
    pub questions: BTreeMap<Uuid, Question>,
    pub answers: BTreeMap<Uuid, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignOutput {
    pub signature: String,
}

pub struct SignService {
    users: Arc<dyn UserStore>,
    questions: Arc<dyn QuestionCatalog>,
    answers: Arc<dyn AnswerLedger>,
    signatures: Arc<dyn SignatureLedger>,
    tm: Arc<dyn TransactionManager>,
}

impl SignService {
    pub fn new(
        users: Arc<dyn UserStore>,
        questions: Arc<dyn QuestionCatalog>,
        answers: Arc<dyn AnswerLedger>,
        signatures: Arc<dyn SignatureLedger>,
        tm: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            users,
            questions,
            answers,
            signatures,
            tm,
        }
    }

    /// Run the whole workflow and return the new signature id
    pub fn sign(&self, input: SignInput) -> Result<SignOutput, LedgerError> {
        self.ensure_user_exists(&input)?;
        self.sanity_check(&input)?;

        let mut scope = self.tm.begin()?;

        let id = match self.write_signing(&mut scope, &input) {
            Ok(id) => id,
            Err(e) => {
                warn!(user_id = %input.user.id, error = %e, "Signing failed, rolling back");
                self.tm.rollback(&mut scope);
                return Err(e);
            }
        };

        self.tm.commit(&mut scope)?;

        info!(
            signature_id = %id,
            user_id = %input.user.id,
            answers = input.answers.len(),
            "Signature committed"
        );

        Ok(SignOutput {
            signature: id.to_string(),
        })
    }

    /// Register the identity if it has never been seen
    pub fn ensure_user_exists(&self, input: &SignInput) -> Result<(), LedgerError> {
        match self.users.get(&input.user.id)? {
            Some(_) => Ok(()),
            None => {
                debug!(user_id = %input.user.id, "Registering new identity");
                self.users.persist(&input.user)
            }
        }
    }

    /// Every question needs an answer and every answer a question.
    /// Empty sets pass as a vacuous bijection.
    pub fn sanity_check(&self, input: &SignInput) -> Result<(), LedgerError> {
        for (id, question) in &input.questions {
            if question.id != *id {
                return Err(LedgerError::Validation(format!(
                    "question keyed by '{}' carries id '{}'",
                    id, question.id
                )));
            }
            if !input.answers.contains_key(id) {
                return Err(LedgerError::Validation(format!(
                    "answer for question with id '{}' is missing",
                    id
                )));
            }
        }

        for id in input.answers.keys() {
            if !input.questions.contains_key(id) {
                return Err(LedgerError::Validation(format!(
                    "question with id '{}' is missing",
                    id
                )));
            }
        }

        Ok(())
    }

    fn write_signing(&self, scope: &mut Scope, input: &SignInput) -> Result<Uuid, LedgerError> {
        self.populate_questions(scope, input)?;
        let id = self.create_signature(scope, input)?;
        self.populate_answers(scope, &id, input)?;
        Ok(id)
    }

    fn populate_questions(&self, scope: &mut Scope, input: &SignInput) -> Result<(), LedgerError> {
        let questions: Vec<Question> = input.questions.values().cloned().collect();
        self.questions.persist(scope, &questions)?;
        Ok(())
    }

    fn create_signature(&self, scope: &mut Scope, input: &SignInput) -> Result<Uuid, LedgerError> {
        let signature = Signature {
            id: Uuid::new_v4(),
            owner: input.user.clone(),
            created_at: Utc::now(),
        };
        self.signatures.persist(scope, &signature)?;
        Ok(signature.id)
    }

    fn populate_answers(
        &self,
        scope: &mut Scope,
        signature_id: &Uuid,
        input: &SignInput,
    ) -> Result<(), LedgerError> {
        let answers: Vec<PendingAnswer> = input
            .answers
            .iter()
            .map(|(question_id, answer)| PendingAnswer {
                question_id: *question_id,
                answer: answer.clone(),
            })
            .collect();

        self.answers.persist(scope, signature_id, &answers)
    }
}
