//! ============================================================================
//! Core Types - Records and errors shared across student-care
//! ============================================================================
//! Users and chat entries as they live in the store, plus the error type
//! every fallible operation returns.
//! ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque key, generated on registration
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
    /// Stored lower-cased
    pub email: String,
}

impl User {
    /// Create a new user with a fresh identifier
    pub fn new(name: String, phone_number: String, email: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            phone_number,
            email: email.to_lowercase(),
        }
    }

    /// Whether `identifier` equals this user's phone number or email
    pub fn matches_contact(&self, identifier: &str) -> bool {
        self.phone_number == identifier || self.email == identifier
    }
}

/// One exchange between a student and the assistant.
/// Append-only: entries are never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Raw text the student typed
    pub user_input: String,
    /// Text printed back to the student
    pub bot_response: String,
    /// Unix timestamp (UTC seconds)
    pub created_at: i64,
}

impl ChatEntry {
    /// Create an entry stamped with the current UTC time
    pub fn new(user_id: Uuid, user_input: String, bot_response: String) -> Self {
        Self::at(user_id, user_input, bot_response, chrono::Utc::now().timestamp())
    }

    /// Create an entry with an explicit timestamp
    pub fn at(user_id: Uuid, user_input: String, bot_response: String, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            user_input,
            bot_response,
            created_at,
        }
    }
}

/// Record counts per collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub users: u64,
    pub chat_entries: u64,
}

/// Errors surfaced by student-care operations
#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CareResult<T> = Result<T, CareError>;
