// src/store/mod.rs

pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::models::answer::{AnswerOption, AnswerRecord, Scope, SlotKey};
use crate::models::question::StoredQuestion;
use crate::models::result::SimulationResult;
use crate::models::user::UserProfile;

/// Errors surfaced by the question/answer/result store.
#[derive(Debug)]
pub enum StoreError {
    /// The backing store could not serve the request (connectivity, query
    /// failure). Transient from the caller's point of view.
    Unavailable(String),

    /// The store returned data the application cannot interpret.
    Corrupt(String),

    /// A uniqueness constraint was violated (e.g. duplicate registration).
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "corrupt store data: {}", msg),
            StoreError::Conflict(msg) => write!(f, "conflict: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// The external question/answer/result store the engine collaborates with.
///
/// All writes are idempotent overwrites by key. The engine never sees raw
/// rows; it consumes this trait through an explicit `Arc` handle.
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError>;

    async fn fetch_user(&self, email: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn create_user(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Fetches a question without validating its structure; `None` when the
    /// slot does not exist at all.
    async fn fetch_question(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<StoredQuestion>, StoreError>;

    /// Fetches the canonical correct option; `None` when no answer key
    /// exists for the slot.
    async fn fetch_canonical_answer(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<AnswerOption>, StoreError>;

    /// Overwrites the answer record for the slot (last write wins).
    async fn write_answer_record(
        &self,
        key: &SlotKey,
        record: &AnswerRecord,
    ) -> Result<(), StoreError>;

    /// All answer records one user has in a scope, in question order.
    async fn fetch_answer_records(
        &self,
        user_email: &str,
        scope: &Scope,
    ) -> Result<Vec<AnswerRecord>, StoreError>;

    /// Overwrites the simulation result for (user, simulation).
    async fn write_simulation_result(
        &self,
        user_email: &str,
        result: &SimulationResult,
    ) -> Result<(), StoreError>;

    async fn fetch_simulation_result(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<Option<SimulationResult>, StoreError>;
}
