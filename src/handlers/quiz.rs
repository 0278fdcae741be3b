// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{CreateQuizRequest, NewField, NewQuestion, NewQuiz, Pager, PublicQuiz},
    state::AppState,
    utils::{html::sanitize_description, jwt::Claims},
};

const PAGE_SIZE: usize = 20;
const LEADERBOARD_SIZE: i64 = 50;

/// Creates a quiz with its nested questions and fields.
///
/// * Validates the whole structure (≥1 question, each with ≥1 field).
/// * Sanitizes the author-supplied description.
/// * Duration arrives in minutes and is stored in seconds.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let author_id = claims.user_id()?;

    let questions = payload
        .questions
        .into_iter()
        .map(|question| NewQuestion {
            name: question.name,
            question_type: question.question_type,
            tooltip: question.tooltip,
            image: question.image,
            max_points: question.max_points,
            fields: question
                .fields
                .into_iter()
                .map(|field| NewField {
                    name: field.name,
                    value: field.value,
                    image: field.image,
                    is_correct: field.is_correct,
                })
                .collect(),
        })
        .collect();

    let quiz_id = state
        .quizzes
        .create(NewQuiz {
            title: payload.title,
            description: sanitize_description(&payload.description),
            image: payload.image,
            duration: payload.duration * 60,
            end_date: payload.end_date,
            bonuses: payload.bonuses,
            private: payload.private,
            author_id,
            questions,
        })
        .await?;

    tracing::info!(quiz_id, author_id, "Quiz created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "success", "id": quiz_id })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuizzesParams {
    pub search: Option<String>,
    pub page: Option<usize>,
}

/// Paginated quiz listing, newest first, optional title search.
pub async fn get_quizzes(
    State(state): State<AppState>,
    Query(params): Query<ListQuizzesParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (items, total) = state.quizzes.list(search, page, PAGE_SIZE).await?;

    Ok(Json(json!({
        "pager": Pager::new(page, PAGE_SIZE, total),
        "items": items,
    })))
}

/// The ten newest quizzes.
pub async fn latest_quizzes(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.quizzes.latest(10).await?;
    Ok(Json(json!({ "quizzes": quizzes })))
}

/// The ten quizzes with the most play sessions.
pub async fn most_played(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.quizzes.most_played(10).await?;
    Ok(Json(json!({ "quizzes": quizzes })))
}

/// A single quiz (public projection) with its leaderboard top 50.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state
        .quizzes
        .detailed(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Quiz does not exist".to_string()))?;

    let leaderboard = state.leaderboard.top_for_quiz(id, LEADERBOARD_SIZE).await?;

    Ok(Json(json!({
        "quiz": PublicQuiz::from(&quiz),
        "leaderboard": leaderboard,
        "message": "success",
    })))
}

#[derive(Debug, Deserialize)]
pub struct QuizActionRequest {
    pub id: i64,
    pub action: String,
}

/// Author-only lifecycle actions: delete, close, resetleaderboard.
pub async fn quiz_action(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = claims.user_id()?;
    state
        .engine
        .quiz_action(payload.id, &payload.action, author_id)
        .await?;

    tracing::info!(quiz_id = payload.id, action = %payload.action, "Quiz action applied");
    Ok(Json(json!({ "message": "success" })))
}

#[derive(Debug, Deserialize)]
pub struct SendInvitesRequest {
    pub id: i64,
    pub invites: Vec<String>,
}

/// Adds usernames to a private quiz's invite list (author only).
pub async fn send_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendInvitesRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = claims.user_id()?;
    state
        .engine
        .send_invites(payload.id, &payload.invites, author_id)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "message": "success" }))))
}

#[derive(Debug, Deserialize)]
pub struct RemoveInviteRequest {
    pub id: i64,
    pub user: String,
}

/// Removes one username from a quiz's invite list (author only).
pub async fn remove_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<RemoveInviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = claims.user_id()?;
    state
        .engine
        .remove_invite(payload.id, &payload.user, author_id)
        .await?;

    Ok(Json(json!({ "message": "success" })))
}
