//! ============================================================================
//! User Registry - Identify returning students, register new ones
//! ============================================================================
//! Lookup is an exact, case-folded match on phone number or email.
//! Uniqueness is not enforced: registering the same contact twice creates
//! two records.
//! ============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::store::CareStore;
use crate::types::{CareError, CareResult, User};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+").expect("valid email pattern"));

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\d{10,15}$").expect("valid phone pattern"));

pub const INVALID_EMAIL: &str = "Invalid email format.";
pub const INVALID_PHONE: &str = "Invalid phone number format (10-15 digits, optional +).";

/// Check a phone number: 10-15 digits with an optional leading '+'
pub fn validate_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone)
}

/// Check an email: a local part, one '@', and a dot inside the domain part
pub fn validate_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Validate both contact fields, email first
pub fn validate_contact(email: &str, phone: &str) -> CareResult<()> {
    if !validate_email(email) {
        return Err(CareError::Validation(INVALID_EMAIL.to_string()));
    }
    if !validate_phone(phone) {
        return Err(CareError::Validation(INVALID_PHONE.to_string()));
    }
    Ok(())
}

/// Greeting for a student who just registered
pub fn new_user_greeting(name: &str) -> String {
    format!(
        "Welcome, {}! Thank you for sharing your details. I'm here to help with any mental health concerns. What's on your mind?",
        name
    )
}

/// Greeting for a returning student, with an optional follow-up question
pub fn returning_user_greeting(name: &str, follow_up: Option<&str>) -> String {
    let mut greeting = format!(
        "Welcome back, {}! I'm here to support you with any mental health concerns.",
        name
    );
    match follow_up {
        Some(question) => {
            greeting.push(' ');
            greeting.push_str(question);
        }
        None => greeting.push_str(" What's on your mind?"),
    }
    greeting
}

/// Registry of students backed by the users collection
pub struct UserRegistry {
    store: Arc<dyn CareStore>,
}

impl UserRegistry {
    pub fn new(store: Arc<dyn CareStore>) -> Self {
        Self { store }
    }

    /// Find a user by phone number or email
    pub async fn identify(&self, identifier: &str) -> CareResult<Option<User>> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() {
            return Ok(None);
        }

        let user = self.store.find_user(&identifier).await?;
        debug!("Identify lookup {}", if user.is_some() { "hit" } else { "miss" });
        Ok(user)
    }

    /// Validate and store a new user. Nothing is written when validation fails.
    pub async fn register(&self, name: &str, phone: &str, email: &str) -> CareResult<User> {
        let name = name.trim();
        let phone = phone.trim();
        let email = email.trim().to_lowercase();

        validate_contact(&email, phone)?;

        let user = User::new(name.to_string(), phone.to_string(), email);
        self.store.insert_user(&user).await?;

        info!("Registered user {}", user.id);
        Ok(user)
    }
}
