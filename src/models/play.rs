// src/models/play.rs

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::question::QuestionStub;
use crate::error::AppError;

/// Explicit play session lifecycle. Transitions are guarded by the engine;
/// `Finished` is terminal and makes the session immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    InProgress,
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::InProgress => "in_progress",
            SessionState::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SessionState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SessionState::Created),
            "in_progress" => Ok(SessionState::InProgress),
            "finished" => Ok(SessionState::Finished),
            other => Err(AppError::InvalidState(format!(
                "Unknown session state '{}'",
                other
            ))),
        }
    }
}

/// One entry of the play progress record. The entry at position `k`
/// corresponds to the quiz's question at position `k`; exactly the last
/// entry may be `Pending` while the session is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessEntry {
    /// Question reached but not answered yet.
    Pending { question: QuestionStub },
    /// Question answered; scoring is final.
    #[serde(rename_all = "camelCase")]
    Answered {
        question: QuestionStub,
        earned_points: f64,
        answered_values: Vec<String>,
    },
}

impl ProcessEntry {
    pub fn question(&self) -> &QuestionStub {
        match self {
            ProcessEntry::Pending { question } => question,
            ProcessEntry::Answered { question, .. } => question,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, ProcessEntry::Answered { .. })
    }
}

/// One player's attempt at a quiz, tracked from start to finish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySession {
    pub id: i64,
    pub quiz_id: i64,
    /// The player who owns this attempt.
    pub author_id: i64,
    pub process: Vec<ProcessEntry>,
    pub points: f64,
    /// Remaining seconds, checkpointed by the client.
    #[serde(rename = "time")]
    pub time_left: i64,
    pub state: SessionState,
    /// Optimistic concurrency counter; bumped on every progress write.
    #[serde(skip_serializing, default)]
    pub version: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl PlaySession {
    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }
}

/// Data handed to the repository when a session is started.
#[derive(Debug, Clone)]
pub struct NewPlay {
    pub quiz_id: i64,
    pub author_id: i64,
    pub process: Vec<ProcessEntry>,
    pub time_left: i64,
}

/// A submitted answer value: a single string for text/radio questions,
/// an array of selected values for checkbox questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    One(String),
    Many(Vec<String>),
}

impl AnswerValue {
    pub fn as_slice(&self) -> &[String] {
        match self {
            AnswerValue::One(v) => std::slice::from_ref(v),
            AnswerValue::Many(vs) => vs,
        }
    }

    pub fn first(&self) -> Option<&str> {
        self.as_slice().first().map(String::as_str)
    }
}

/// One answer entry within a submit call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub field_id: i64,
    pub value: AnswerValue,
}

/// DTO for starting a play session.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartPlayRequest {
    pub quiz_id: i64,
    #[validate(length(min = 1, max = 50))]
    pub username: String,
}

/// DTO for submitting answers to the current question.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub id: i64,
    pub answers: Vec<SubmittedAnswer>,
}

/// DTO for the timer checkpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTimeRequest {
    pub time_left: i64,
}

/// DTO for finishing a play session.
#[derive(Debug, Deserialize)]
pub struct FinishPlayRequest {
    pub id: i64,
}

/// Outcome of a submit call: the next question's stub, or the end marker
/// once the question list is exhausted. Serialized as the stub object or
/// the literal string "end".
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitNext {
    Question(QuestionStub),
    End,
}

impl Serialize for SubmitNext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            SubmitNext::Question(stub) => stub.serialize(serializer),
            SubmitNext::End => serializer.serialize_str("end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;

    fn stub() -> QuestionStub {
        QuestionStub {
            id: 7,
            name: "Capital of France?".to_string(),
            question_type: QuestionType::Text,
            tooltip: None,
            image: None,
            max_points: 10.0,
        }
    }

    #[test]
    fn process_entry_tagging_round_trips() {
        let pending = ProcessEntry::Pending { question: stub() };
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["question"]["id"], 7);

        let answered = ProcessEntry::Answered {
            question: stub(),
            earned_points: 5.0,
            answered_values: vec!["Paris".to_string()],
        };
        let json = serde_json::to_value(&answered).unwrap();
        assert_eq!(json["status"], "answered");
        assert_eq!(json["earnedPoints"], 5.0);

        let back: ProcessEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, answered);
    }

    #[test]
    fn answer_value_accepts_both_shapes() {
        let one: AnswerValue = serde_json::from_str(r#""Paris""#).unwrap();
        assert_eq!(one.as_slice(), ["Paris".to_string()]);

        let many: AnswerValue = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(many.as_slice().len(), 2);
    }

    #[test]
    fn submit_next_serializes_end_marker() {
        let next = SubmitNext::End;
        assert_eq!(serde_json::to_value(&next).unwrap(), "end");

        let next = SubmitNext::Question(stub());
        let json = serde_json::to_value(&next).unwrap();
        assert_eq!(json["maxPoints"], 10.0);
    }
}
