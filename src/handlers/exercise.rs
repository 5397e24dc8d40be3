// src/handlers/exercise.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    engine::recorder,
    error::AppError,
    handlers::{UserQuery, load_question, parse_subtest},
    models::answer::{AnswerOption, Scope, SlotKey},
    store::ExamStore,
};

/// DTO for submitting a practice answer.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub email: String,
    pub selected_option: AnswerOption,
}

/// Returns one practice question of a category, together with the user's
/// previously selected option for that slot, if any.
pub async fn get_question(
    State(store): State<Arc<dyn ExamStore>>,
    Path((category, question_index)): Path<(String, u32)>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let category = parse_subtest(&category)?;
    let scope = Scope::Exercise { category };
    let email = user.email.to_lowercase();

    let question = load_question(&store, &scope, question_index).await?;

    let records = store.fetch_answer_records(&email, &scope).await?;
    let selected_option = records
        .iter()
        .find(|r| r.question_index == question_index)
        .map(|r| r.selected_option);

    Ok(Json(json!({
        "category": category.code(),
        "category_name": category.display_name(),
        "question_index": question_index,
        "question": question,
        "selected_option": selected_option,
    })))
}

/// Records a practice answer: correctness is resolved against the live
/// canonical answer at write time and the slot is overwritten.
pub async fn submit_answer(
    State(store): State<Arc<dyn ExamStore>>,
    Path((category, question_index)): Path<(String, u32)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = parse_subtest(&category)?;
    let key = SlotKey {
        user_email: payload.email.to_lowercase(),
        scope: Scope::Exercise { category },
        question_index,
    };

    recorder::record(
        store.as_ref(),
        &key,
        payload.selected_option,
        chrono::Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "category": category.code(),
        "question_index": question_index,
        "selected_option": payload.selected_option,
        "recorded": true,
    })))
}

/// Answered/correct grid for one category.
pub async fn get_progress(
    State(store): State<Arc<dyn ExamStore>>,
    Path(category): Path<String>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let category = parse_subtest(&category)?;
    let scope = Scope::Exercise { category };
    let email = user.email.to_lowercase();

    let records = store.fetch_answer_records(&email, &scope).await?;
    let correct_count = records.iter().filter(|r| r.is_correct).count();

    Ok(Json(json!({
        "category": category.code(),
        "total_questions": category.question_count(),
        "answered_count": records.len(),
        "correct_count": correct_count,
        "answers": records,
    })))
}
