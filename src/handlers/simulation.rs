// src/handlers/simulation.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    engine::SimulationEngine,
    engine::subtest::Subtest,
    error::AppError,
    handlers::{UserQuery, load_question, parse_subtest},
    models::answer::{AnswerOption, Scope},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub email: String,
    /// When true, any existing session is discarded and the simulation
    /// starts over from the first question.
    #[serde(default)]
    pub restart: bool,
}

/// DTO for setting the user's current choice. Carries the subtest the
/// selection was made on so a stale request cannot leak into the next one.
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub email: String,
    pub subtest: Subtest,
    pub selected_option: AnswerOption,
}

/// DTO for navigation events, guarded by the subtest they were issued for.
#[derive(Debug, Deserialize)]
pub struct NavRequest {
    pub email: String,
    pub subtest: Subtest,
}

/// Starts a simulation session at the first question of the first subtest,
/// or resumes the existing one unchanged. With `restart`, the session is
/// reset and the next completion overwrites the stored result.
pub async fn open_session(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Json(payload): Json<SessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.to_lowercase();
    let view = if payload.restart {
        engine.restart_session(&email, simulation_id).await
    } else {
        engine.open_session(&email, simulation_id).await
    };
    Ok(Json(view))
}

/// Logout for a simulation: drops the in-memory session and clears its
/// timer anchors. Recorded answers and persisted results are unaffected.
pub async fn close_session(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    engine
        .close_session(&user.email.to_lowercase(), simulation_id)
        .await?;
    Ok(Json(json!({ "closed": true })))
}

pub async fn get_session(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let view = engine
        .session_view(&user.email.to_lowercase(), simulation_id)
        .await?;
    Ok(Json(view))
}

/// Returns one simulation question together with the countdown state.
///
/// Entering the active subtest's question anchors its countdown on first
/// visit and keeps the tick loop running; if the time had already run out
/// while the user was away, the expiry transition is applied and reported
/// here. Questions of any other subtest are served read-only and never
/// start a countdown.
pub async fn get_question(
    State(state): State<AppState>,
    Path((simulation_id, subtest, question_index)): Path<(i64, String, u32)>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let subtest = parse_subtest(&subtest)?;
    if question_index < 1 || question_index > subtest.question_count() {
        return Err(AppError::BadRequest(format!(
            "Question index out of range for {}",
            subtest.code()
        )));
    }

    let email = user.email.to_lowercase();
    let entry = state
        .engine
        .enter_subtest(&email, simulation_id, subtest)
        .await?;

    let scope = Scope::Simulation {
        simulation_id,
        subtest,
    };
    let question = load_question(&state.store, &scope, question_index).await?;

    let records = state.store.fetch_answer_records(&email, &scope).await?;
    let selected_option = records
        .iter()
        .find(|r| r.question_index == question_index)
        .map(|r| r.selected_option);

    Ok(Json(json!({
        "simulation_id": simulation_id,
        "subtest": subtest.code(),
        "subtest_name": subtest.display_name(),
        "question_index": question_index,
        "total_questions": subtest.question_count(),
        "question": question,
        "selected_option": selected_option,
        "entry": entry,
    })))
}

/// Sets the pending choice for the question the session is currently on.
/// Rejected once time has run out for the subtest.
pub async fn select_answer(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Json(payload): Json<SelectRequest>,
) -> Result<impl IntoResponse, AppError> {
    engine
        .select(
            &payload.email.to_lowercase(),
            simulation_id,
            payload.subtest,
            payload.selected_option,
        )
        .await?;
    Ok(Json(json!({ "selected_option": payload.selected_option })))
}

/// Records the pending answer and moves forward: next question, next
/// subtest after the last question, or Terminal (with the aggregated
/// result) after the last subtest.
pub async fn advance(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Json(payload): Json<NavRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = engine
        .advance(&payload.email.to_lowercase(), simulation_id, payload.subtest)
        .await?;
    Ok(Json(outcome))
}

/// Records the pending answer and moves one question back. A no-op on the
/// first question or once the subtest has expired.
pub async fn retreat(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Json(payload): Json<NavRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = engine
        .retreat(&payload.email.to_lowercase(), simulation_id, payload.subtest)
        .await?;
    Ok(Json(outcome))
}

/// Answered grid plus remaining time for one subtest of a simulation.
pub async fn get_progress(
    State(state): State<AppState>,
    Path((simulation_id, subtest)): Path<(i64, String)>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let subtest = parse_subtest(&subtest)?;
    let email = user.email.to_lowercase();
    let scope = Scope::Simulation {
        simulation_id,
        subtest,
    };

    let records = state.store.fetch_answer_records(&email, &scope).await?;
    let remaining_seconds = state.engine.anchors().remaining(
        &crate::engine::timer::AnchorKey {
            user_email: email,
            simulation_id,
            subtest,
        },
        subtest.time_limit_secs(),
        state.engine.now(),
    );

    Ok(Json(json!({
        "simulation_id": simulation_id,
        "subtest": subtest.code(),
        "total_questions": subtest.question_count(),
        "answered_count": records.len(),
        "remaining_seconds": remaining_seconds,
        "answers": records,
    })))
}

/// The persisted simulation result. 404 until a completion event has
/// aggregated one; the results view treats that as "not available yet".
pub async fn get_result(
    State(engine): State<Arc<SimulationEngine>>,
    Path(simulation_id): Path<i64>,
    Query(user): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = engine
        .result_of(&user.email.to_lowercase(), simulation_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not available yet".to_string()))?;
    Ok(Json(result))
}
