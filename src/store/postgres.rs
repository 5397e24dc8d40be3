// src/store/postgres.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::prelude::FromRow;
use sqlx::types::Json;

use crate::models::answer::{AnswerOption, AnswerRecord, Scope, SlotKey};
use crate::models::question::StoredQuestion;
use crate::models::result::{SimulationResult, SubtestResult};
use crate::models::user::UserProfile;
use crate::store::{ExamStore, StoreError};

/// Postgres-backed `ExamStore`.
///
/// Exercise and simulation content share the same tables, discriminated by
/// a `scope` column; exercise rows use simulation_id = 0.
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// (scope discriminator, simulation id, category code) column triple.
fn scope_columns(scope: &Scope) -> (&'static str, i64, &'static str) {
    match *scope {
        Scope::Exercise { category } => ("exercise", 0, category.code()),
        Scope::Simulation {
            simulation_id,
            subtest,
        } => ("simulation", simulation_id, subtest.code()),
    }
}

fn parse_option(raw: &str) -> Result<AnswerOption, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("invalid answer option '{}'", raw)))
}

#[derive(FromRow)]
struct UserRow {
    email: String,
    name: String,
    university: String,
    major: String,
    target_score: String,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            email: row.email,
            name: row.name,
            university: row.university,
            major: row.major,
            target_score: row.target_score,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    question: String,
    options: Json<BTreeMap<String, String>>,
}

#[derive(FromRow)]
struct AnswerRecordRow {
    question_index: i32,
    selected_option: String,
    is_correct: bool,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(FromRow)]
struct ResultRow {
    simulation_id: i64,
    subtest_results: Json<Vec<SubtestResult>>,
    final_score: i64,
    completed_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn user_exists(&self, email: &str) -> Result<bool, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch_user(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT email, name, university, major, target_score, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn create_user(&self, profile: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (email, name, university, major, target_score)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.university)
        .bind(&profile.major)
        .bind(&profile.target_score)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Postgres error code for unique violation is 23505
            if e.to_string().contains("23505") || e.to_string().contains("unique constraint") {
                StoreError::Conflict(format!("user '{}' already exists", profile.email))
            } else {
                StoreError::from(e)
            }
        })?;
        Ok(())
    }

    async fn fetch_question(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<StoredQuestion>, StoreError> {
        let (kind, simulation_id, category) = scope_columns(scope);
        let row: Option<QuestionRow> = sqlx::query_as(
            "SELECT question, options FROM questions
             WHERE scope = $1 AND simulation_id = $2 AND category = $3 AND question_index = $4",
        )
        .bind(kind)
        .bind(simulation_id)
        .bind(category)
        .bind(question_index as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredQuestion {
            question: r.question,
            options: r.options.0,
        }))
    }

    async fn fetch_canonical_answer(
        &self,
        scope: &Scope,
        question_index: u32,
    ) -> Result<Option<AnswerOption>, StoreError> {
        let (kind, simulation_id, category) = scope_columns(scope);
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT correct_option FROM canonical_answers
             WHERE scope = $1 AND simulation_id = $2 AND category = $3 AND question_index = $4",
        )
        .bind(kind)
        .bind(simulation_id)
        .bind(category)
        .bind(question_index as i32)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(raw,)| parse_option(&raw)).transpose()
    }

    async fn write_answer_record(
        &self,
        key: &SlotKey,
        record: &AnswerRecord,
    ) -> Result<(), StoreError> {
        let (kind, simulation_id, category) = scope_columns(&key.scope);
        sqlx::query(
            "INSERT INTO answer_records
                 (user_email, scope, simulation_id, category, question_index,
                  selected_option, is_correct, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_email, scope, simulation_id, category, question_index)
             DO UPDATE SET
                 selected_option = EXCLUDED.selected_option,
                 is_correct = EXCLUDED.is_correct,
                 recorded_at = EXCLUDED.recorded_at",
        )
        .bind(&key.user_email)
        .bind(kind)
        .bind(simulation_id)
        .bind(category)
        .bind(key.question_index as i32)
        .bind(record.selected_option.as_str())
        .bind(record.is_correct)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_answer_records(
        &self,
        user_email: &str,
        scope: &Scope,
    ) -> Result<Vec<AnswerRecord>, StoreError> {
        let (kind, simulation_id, category) = scope_columns(scope);
        let rows: Vec<AnswerRecordRow> = sqlx::query_as(
            "SELECT question_index, selected_option, is_correct, recorded_at
             FROM answer_records
             WHERE user_email = $1 AND scope = $2 AND simulation_id = $3 AND category = $4
             ORDER BY question_index",
        )
        .bind(user_email)
        .bind(kind)
        .bind(simulation_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(AnswerRecord {
                    question_index: row.question_index as u32,
                    selected_option: parse_option(&row.selected_option)?,
                    is_correct: row.is_correct,
                    recorded_at: row.recorded_at,
                })
            })
            .collect()
    }

    async fn write_simulation_result(
        &self,
        user_email: &str,
        result: &SimulationResult,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO simulation_results
                 (user_email, simulation_id, subtest_results, final_score, completed_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_email, simulation_id)
             DO UPDATE SET
                 subtest_results = EXCLUDED.subtest_results,
                 final_score = EXCLUDED.final_score,
                 completed_at = EXCLUDED.completed_at",
        )
        .bind(user_email)
        .bind(result.simulation_id)
        .bind(Json(&result.subtest_results))
        .bind(result.final_score)
        .bind(result.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_simulation_result(
        &self,
        user_email: &str,
        simulation_id: i64,
    ) -> Result<Option<SimulationResult>, StoreError> {
        let row: Option<ResultRow> = sqlx::query_as(
            "SELECT simulation_id, subtest_results, final_score, completed_at
             FROM simulation_results
             WHERE user_email = $1 AND simulation_id = $2",
        )
        .bind(user_email)
        .bind(simulation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SimulationResult {
            simulation_id: r.simulation_id,
            subtest_results: r.subtest_results.0,
            final_score: r.final_score,
            completed_at: r.completed_at,
        }))
    }
}
