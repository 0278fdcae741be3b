// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use url::Url;
use validator::Validate;

use super::question::{CreateQuestionRequest, Question, QuestionStub};

/// A bonus tier: finishing with at least `time` minutes of budget left
/// awards `points` extra points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusTier {
    /// Threshold in minutes.
    pub time: f64,
    pub points: f64,
}

/// A quiz with its full question list, as the engine sees it
/// (field correctness included). Not serialized to players directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    /// Play time budget in seconds.
    pub duration: i64,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub bonuses: Vec<BonusTier>,
    pub private: bool,
    /// Usernames allowed to start the quiz; meaningful only if private.
    pub allowed: Vec<String>,
    pub author_id: i64,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub questions: Vec<Question>,
}

/// Player-facing quiz projection: question headers only, no fields,
/// no invite list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub duration: i64,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub bonuses: Vec<BonusTier>,
    pub private: bool,
    pub author_id: i64,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub questions: Vec<QuestionStub>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        PublicQuiz {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            image: quiz.image.clone(),
            duration: quiz.duration,
            end_date: quiz.end_date,
            bonuses: quiz.bonuses.clone(),
            private: quiz.private,
            author_id: quiz.author_id,
            active: quiz.active,
            created_at: quiz.created_at,
            questions: quiz.questions.iter().map(QuestionStub::from).collect(),
        }
    }
}

/// Row shape for quiz listings (search, latest, most played).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub duration: i64,
    pub private: bool,
    pub active: bool,
    pub author_id: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub question_count: i64,
    /// Number of play sessions started against this quiz.
    pub plays: i64,
}

/// Pagination metadata returned next to a page of items.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl Pager {
    pub fn new(page: usize, page_size: usize, total: usize) -> Self {
        Pager {
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size.max(1)),
        }
    }
}

/// DTO for creating a quiz with its nested questions and fields.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    #[validate(custom(function = validate_image_url))]
    pub image: Option<String>,
    /// Play time budget in minutes; stored as seconds.
    #[validate(range(min = 1, message = "Invalid duration. Must be a positive number."))]
    pub duration: i64,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub bonuses: Vec<BonusTier>,
    #[serde(default)]
    pub private: bool,
    #[validate(
        length(min = 1, message = "A quiz needs at least one question."),
        nested
    )]
    pub questions: Vec<CreateQuestionRequest>,
}

/// Validated quiz data handed to the repository for insertion.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    /// Seconds.
    pub duration: i64,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub bonuses: Vec<BonusTier>,
    pub private: bool,
    pub author_id: i64,
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub name: String,
    pub question_type: super::question::QuestionType,
    pub tooltip: Option<String>,
    pub image: Option<String>,
    pub max_points: f64,
    pub fields: Vec<NewField>,
}

#[derive(Debug, Clone)]
pub struct NewField {
    pub name: String,
    pub value: String,
    pub image: Option<String>,
    pub is_correct: bool,
}

pub fn validate_image_url(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_image_url"));
    }
    Ok(())
}
