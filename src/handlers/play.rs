// src/handlers/play.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::play::{
        FinishPlayRequest, StartPlayRequest, SubmitAnswerRequest, UpdateTimeRequest,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Starts a play session for the authenticated player.
///
/// The quiz must exist and be active; for private quizzes the player's
/// username must be on the invite list.
pub async fn start_play(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartPlayRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let player_id = claims.user_id()?;
    let play = state
        .engine
        .start(payload.quiz_id, &payload.username, player_id)
        .await?;

    tracing::info!(play_id = play.id, quiz_id = payload.quiz_id, "Play started");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "success", "id": play.id })),
    ))
}

/// The player's view of an attempt: quiz projection, session, and the
/// current question with correctness stripped.
pub async fn get_play_view(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let player_id = claims.user_id()?;
    let view = state.engine.view(id, player_id).await?;
    Ok(Json(view))
}

/// A question with its fields, `is_correct` stripped (and the canonical
/// value stripped for text questions).
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.engine.public_question(id).await?;
    Ok(Json(json!({ "question": question, "message": "success" })))
}

/// Scores the submitted answers for the current question and returns the
/// next question stub, or "end" once the quiz is exhausted.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let player_id = claims.user_id()?;
    let next = state
        .engine
        .submit_answer(payload.id, player_id, &payload.answers)
        .await?;

    Ok(Json(json!({ "message": "success", "next": next })))
}

/// The stored remaining-time checkpoint.
pub async fn get_time(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let time = state.engine.time(id).await?;
    Ok(Json(json!({ "time": time })))
}

/// Overwrites the remaining-time checkpoint; the client drives the
/// countdown and checkpoints it here periodically.
pub async fn update_time(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTimeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.engine.update_time(id, payload.time_left).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true }))))
}

/// Finishes the attempt: claims the terminal state, applies the time
/// bonus, and reconciles the quiz leaderboard.
pub async fn finish_play(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<FinishPlayRequest>,
) -> Result<impl IntoResponse, AppError> {
    let player_id = claims.user_id()?;
    let quiz_id = state.engine.finish(payload.id, player_id).await?;
    Ok(Json(json!({ "message": "success", "quiz": quiz_id })))
}
