// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, UserProfile},
    store::ExamStore,
};

/// Registers a new learner profile.
///
/// There is no password: login is an email existence check by design.
/// Returns 201 Created with the stored profile.
pub async fn register(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let profile = UserProfile {
        email: payload.email.to_lowercase(),
        name: payload.name,
        university: payload.university,
        major: payload.major,
        target_score: payload.target_score,
        created_at: None,
    };

    store.create_user(&profile).await.map_err(|e| {
        tracing::error!("Failed to register user: {}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Logs a user in by checking that the email exists, returning the profile.
pub async fn login(
    State(store): State<Arc<dyn ExamStore>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let profile = store
        .fetch_user(&payload.email.to_lowercase())
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed: {}", e);
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::NotFound("No account found for this email".to_string()))?;

    Ok(Json(profile))
}
