// src/models/question.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;

/// Closed set of question kinds. Stored as TEXT in the database
/// (constrained by a CHECK) and round-tripped through `FromStr`/`Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Free-typed answer, matched exactly against one canonical field.
    Text,
    /// Single choice; exactly one field is flagged correct.
    Radio,
    /// Multiple choice; score is the fraction of correct fields selected.
    Checkbox,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::Text => "text",
            QuestionType::Radio => "radio",
            QuestionType::Checkbox => "checkbox",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for QuestionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(QuestionType::Text),
            "radio" => Ok(QuestionType::Radio),
            "checkbox" => Ok(QuestionType::Checkbox),
            other => Err(AppError::InvalidState(format!(
                "Unknown question type '{}'",
                other
            ))),
        }
    }
}

/// A question with its fields, as the engine sees it (correctness included).
/// Never serialized to players directly; see [`PublicQuestion`] and
/// [`QuestionStub`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    /// Order within the quiz; progress cursors are positional.
    pub position: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub tooltip: Option<String>,
    pub image: Option<String>,
    pub max_points: f64,
    pub fields: Vec<Field>,
}

/// A selectable option or canonical-answer holder belonging to a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: i64,
    pub question_id: i64,
    pub position: i64,
    pub name: String,
    pub value: String,
    pub image: Option<String>,
    pub is_correct: bool,
}

/// Player-facing question header, embedded in play progress entries.
/// Carries no fields and therefore no correctness data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStub {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub tooltip: Option<String>,
    pub image: Option<String>,
    pub max_points: f64,
}

impl From<&Question> for QuestionStub {
    fn from(q: &Question) -> Self {
        QuestionStub {
            id: q.id,
            name: q.name.clone(),
            question_type: q.question_type,
            tooltip: q.tooltip.clone(),
            image: q.image.clone(),
            max_points: q.max_points,
        }
    }
}

/// Player-facing field: `is_correct` is always stripped, and for text
/// questions the canonical value is stripped too, so the answer never
/// reaches the client before submission.
#[derive(Debug, Clone, Serialize)]
pub struct PublicField {
    pub id: i64,
    pub name: String,
    pub value: Option<String>,
    pub image: Option<String>,
}

/// Question projection returned by the question endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub tooltip: Option<String>,
    pub image: Option<String>,
    pub max_points: f64,
    pub fields: Vec<PublicField>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        let hide_value = q.question_type == QuestionType::Text;
        let fields = q
            .fields
            .iter()
            .map(|f| PublicField {
                id: f.id,
                name: f.name.clone(),
                value: if hide_value { None } else { Some(f.value.clone()) },
                image: f.image.clone(),
            })
            .collect();
        PublicQuestion {
            id: q.id,
            name: q.name.clone(),
            question_type: q.question_type,
            tooltip: q.tooltip.clone(),
            image: q.image.clone(),
            max_points: q.max_points,
            fields,
        }
    }
}

/// DTO for a question inside a create-quiz payload.
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 500))]
    pub name: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(max = 1000))]
    pub tooltip: Option<String>,
    #[validate(custom(function = super::quiz::validate_image_url))]
    pub image: Option<String>,
    #[validate(range(min = 0.000001, message = "maxPoints must be positive"))]
    pub max_points: f64,
    #[validate(
        length(min = 1, message = "Each question needs at least one field."),
        nested
    )]
    pub fields: Vec<CreateFieldRequest>,
}

/// DTO for a field inside a create-quiz payload.
#[derive(Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFieldRequest {
    #[validate(length(min = 1, max = 500))]
    pub name: String,
    #[validate(length(min = 1, max = 2000))]
    pub value: String,
    #[validate(custom(function = super::quiz::validate_image_url))]
    pub image: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}
