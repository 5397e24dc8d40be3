// src/handlers/mod.rs

pub mod auth;
pub mod exercise;
pub mod simulation;

use std::sync::Arc;

use serde::Deserialize;

use crate::engine::subtest::Subtest;
use crate::error::AppError;
use crate::models::answer::Scope;
use crate::models::question::Question;
use crate::store::ExamStore;

/// Identifies the acting user on read endpoints; writes carry the email in
/// their JSON body instead.
#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    pub email: String,
}

pub(crate) fn parse_subtest(raw: &str) -> Result<Subtest, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown category '{}'", raw)))
}

/// Fetches a question and runs structural validation: absent slots are 404,
/// defective rows are a blocking 422 for that question only.
pub(crate) async fn load_question(
    store: &Arc<dyn ExamStore>,
    scope: &Scope,
    question_index: u32,
) -> Result<Question, AppError> {
    let raw = store
        .fetch_question(scope, question_index)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch question {:?} q{}: {}", scope, question_index, e);
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    Question::try_from(raw).map_err(|defect| {
        tracing::warn!(
            "Malformed question {:?} q{}: {}",
            scope,
            question_index,
            defect.0
        );
        AppError::MalformedQuestion(defect.0)
    })
}
