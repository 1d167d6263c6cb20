//! Fetch service - ownership-gated retrieval of a signing event

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::db::{AnswerLedger, SignatureLedger};
use crate::entities::{Answer, User};
use crate::error::LedgerError;

#[derive(Debug, Clone)]
pub struct FetchInput {
    pub user: User,
    pub signature: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutput {
    pub answers: Vec<Answer>,
    /// Signature creation time, seconds since epoch
    pub timestamp: i64,
}

pub struct FetchService {
    answers: Arc<dyn AnswerLedger>,
    signatures: Arc<dyn SignatureLedger>,
}

impl FetchService {
    pub fn new(answers: Arc<dyn AnswerLedger>, signatures: Arc<dyn SignatureLedger>) -> Self {
        Self {
            answers,
            signatures,
        }
    }

    /// Existence is checked before ownership, so an unknown id is always
    /// NotFound regardless of who asks.
    pub fn fetch(&self, input: FetchInput) -> Result<FetchOutput, LedgerError> {
        let signature = self
            .signatures
            .get(&input.signature)?
            .ok_or_else(|| LedgerError::NotFound(format!("signature {}", input.signature)))?;

        if signature.owner.id != input.user.id {
            debug!(
                signature_id = %signature.id,
                requested_by = %input.user.id,
                "Fetch denied to non-owner"
            );
            return Err(LedgerError::AccessForbidden {
                signature_id: signature.id.to_string(),
            });
        }

        let answers = self.answers.get(&signature.id)?;

        Ok(FetchOutput {
            answers,
            timestamp: signature.created_at.timestamp(),
        })
    }
}
