//! Domain types passed between the HTTP boundary, services and stores
//!
//! These are plain data. Database row shapes live in `db::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated party that signs and owns signatures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// Shared question; text is frozen at first insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    #[serde(rename = "question")]
    pub text: String,
}

/// Stored answer with its question embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub question: Question,
    pub answer: String,
}

/// Answer about to be written under a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    pub question_id: Uuid,
    pub answer: String,
}

/// One signing event: who signed and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub id: Uuid,
    pub owner: User,
    pub created_at: DateTime<Utc>,
}
