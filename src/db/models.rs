//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//!
//! Ids are stored as hyphenated UUID text and parsed back on read.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::diesel_schema::*;
use crate::entities::{Answer, Question, Signature, User};
use crate::error::LedgerError;

/// Parse a stored id, treating malformed text as a store fault
pub fn parse_id(raw: &str) -> Result<Uuid, LedgerError> {
    Uuid::parse_str(raw).map_err(|e| LedgerError::Store(format!("Corrupt id '{}': {}", raw, e)))
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRow {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
}

impl UserRow {
    pub fn into_user(self) -> Result<User, LedgerError> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username,
        })
    }
}

// ============================================================================
// Questions
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = questions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuestionRow {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = questions)]
pub struct NewQuestion<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

impl QuestionRow {
    pub fn into_question(self) -> Result<Question, LedgerError> {
        Ok(Question {
            id: parse_id(&self.id)?,
            text: self.text,
        })
    }
}

// ============================================================================
// Signatures
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = signatures)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SignatureRow {
    pub id: String,
    pub owner_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = signatures)]
pub struct NewSignature<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub created_at: i64,
}

impl SignatureRow {
    /// Combine with the joined owner row
    pub fn into_signature(self, owner: UserRow) -> Result<Signature, LedgerError> {
        let created_at = DateTime::<Utc>::from_timestamp(self.created_at, 0).ok_or_else(|| {
            LedgerError::Store(format!(
                "Signature {} has out-of-range timestamp {}",
                self.id, self.created_at
            ))
        })?;

        Ok(Signature {
            id: parse_id(&self.id)?,
            owner: owner.into_user()?,
            created_at,
        })
    }
}

// ============================================================================
// Answers
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = answers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AnswerRow {
    pub id: String,
    pub question_id: String,
    pub text: String,
    pub signature_id: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = answers)]
pub struct NewAnswer<'a> {
    pub id: &'a str,
    pub question_id: &'a str,
    pub text: &'a str,
    pub signature_id: &'a str,
}

impl AnswerRow {
    /// Combine with the joined question row
    pub fn into_answer(self, question: QuestionRow) -> Result<Answer, LedgerError> {
        Ok(Answer {
            id: parse_id(&self.id)?,
            question: question.into_question()?,
            answer: self.text,
        })
    }
}
