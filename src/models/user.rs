// src/models/user.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A registered learner profile.
///
/// There is deliberately no password or session token here: access is an
/// email existence check, and the email travels with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub university: String,
    pub major: String,
    pub target_score: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new profile (registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name length must be between 1 and 100 characters."
    ))]
    pub name: String,
    #[validate(length(min = 1, max = 150))]
    pub university: String,
    #[validate(length(min = 1, max = 150))]
    pub major: String,
    #[validate(length(min = 1, max = 20))]
    pub target_score: String,
}

/// DTO for logging in by email existence check.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
}
