// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::models::answer::{AnswerOption, AnswerRecord, Scope, SlotKey};
use crate::models::question::StoredQuestion;
use crate::models::result::SimulationResult;
use crate::models::user::UserProfile;
use crate::store::{ExamStore, StoreError};

/// In-memory `ExamStore` used by the test suite and local development.
///
/// Seeding goes through `seed_question` / `seed_canonical_answer`; write
/// faults can be injected with `fail_writes` to exercise the optimistic
/// write policy without a real outage.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserProfile>>,
    questions: Mutex<HashMap<(Scope, u32), StoredQuestion>>,
    canonical: Mutex<HashMap<(Scope, u32), AnswerOption>>,
    answers: Mutex<HashMap<SlotKey, AnswerRecord>>,
    results: Mutex<HashMap<(String, i64), SimulationResult>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_question(&self, scope: Scope, question_index: u32, question: StoredQuestion) {
        self.questions
            .lock()
            .unwrap()
            .insert((scope, question_index), question);
    }

    pub fn seed_canonical_answer(&self, scope: Scope, question_index: u32, option: AnswerOption) {
        self.canonical
            .lock()
            .unwrap()
            .insert((scope, question_index), option);
    }

    /// When set, every write fails with `StoreError::Unavailable`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write fault".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.users.lock().unwrap().contains_key(email))
    }

    async fn fetch_user(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn create_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&profile.email) {
            return Err(StoreError::Conflict(format!(
                "user '{}' already exists",
                profile.email
            )));
        }
        users.insert(profile.email.clone(), profile.clone());
        Ok(())
    }

    async fn fetch_question(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<StoredQuestion>, StoreError> {
        Ok(self
            .questions
            .lock()
            .unwrap()
            .get(&(*scope, question_index))
            .cloned())
    }

    async fn fetch_canonical_answer(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<AnswerOption>, StoreError> {
        Ok(self
            .canonical
            .lock()
            .unwrap()
            .get(&(*scope, question_index))
            .copied())
    }

    async fn write_answer_record(
        &self,
        key: &SlotKey,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.answers
            .lock()
            .unwrap()
            .insert(key.clone(), record.clone());
        Ok(())
    }

    async fn fetch_answer_records(
        &self,
        user_email: &str,
        scope: &Scope,
    ) -> Result<Vec<AnswerRecord>, StoreError> {
        let answers = self.answers.lock().unwrap();
        let mut records: Vec<AnswerRecord> = answers
            .iter()
            .filter(|(key, _)| key.user_email == user_email && key.scope == *scope)
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by_key(|r| r.question_index);
        Ok(records)
    }

    async fn write_simulation_result(
        &self,
        user_email: &str,
        result: &SimulationResult,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        self.results
            .lock()
            .unwrap()
            .insert((user_email.to_string(), result.simulation_id), result.clone());
        Ok(())
    }

    async fn fetch_simulation_result(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<Option<SimulationResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(&(user_email.to_string(), simulation_id))
            .cloned())
    }
}
