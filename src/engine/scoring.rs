// src/engine/scoring.rs

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::play::AnswerValue;
use crate::models::question::{Question, QuestionType};

/// Scores one submitted answer against a question.
///
/// * `text`: full points iff the submitted string equals the referenced
///   field's value. Exact comparison, case-sensitive, no normalization.
/// * `radio`: full points iff the referenced field is the one flagged
///   correct and the submitted value matches it.
/// * `checkbox`: the fraction of correct field values that were selected,
///   times the maximum. Wrong selections are ignored, not subtracted.
///
/// The result is always within `0..=question.max_points`.
pub fn score(
    question: &Question,
    field_id: i64,
    value: &AnswerValue,
) -> Result<f64, AppError> {
    let field = question
        .fields
        .iter()
        .find(|f| f.id == field_id)
        .ok_or_else(|| AppError::NotFound(format!("Field {} does not exist", field_id)))?;

    let max_points = question.max_points;

    let earned = match question.question_type {
        QuestionType::Text => {
            if value.first() == Some(field.value.as_str()) {
                max_points
            } else {
                0.0
            }
        }
        QuestionType::Radio => {
            if field.is_correct && value.first() == Some(field.value.as_str()) {
                max_points
            } else {
                0.0
            }
        }
        QuestionType::Checkbox => {
            let correct: HashSet<&str> = question
                .fields
                .iter()
                .filter(|f| f.is_correct)
                .map(|f| f.value.as_str())
                .collect();

            if correct.is_empty() {
                0.0
            } else {
                // Submitted duplicates must not count twice.
                let selected: HashSet<&str> = value
                    .as_slice()
                    .iter()
                    .map(String::as_str)
                    .filter(|v| correct.contains(v))
                    .collect();
                (selected.len() as f64 / correct.len() as f64) * max_points
            }
        }
    };

    Ok(earned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Field;

    fn field(id: i64, value: &str, is_correct: bool) -> Field {
        Field {
            id,
            question_id: 1,
            position: id,
            name: format!("field-{}", id),
            value: value.to_string(),
            image: None,
            is_correct,
        }
    }

    fn question(question_type: QuestionType, max_points: f64, fields: Vec<Field>) -> Question {
        Question {
            id: 1,
            quiz_id: 1,
            position: 0,
            name: "q".to_string(),
            question_type,
            tooltip: None,
            image: None,
            max_points,
            fields,
        }
    }

    fn one(value: &str) -> AnswerValue {
        AnswerValue::One(value.to_string())
    }

    fn many(values: &[&str]) -> AnswerValue {
        AnswerValue::Many(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn text_exact_match_scores_max() {
        let q = question(QuestionType::Text, 10.0, vec![field(1, "Paris", false)]);
        assert_eq!(score(&q, 1, &one("Paris")).unwrap(), 10.0);
    }

    #[test]
    fn text_is_case_and_whitespace_sensitive() {
        let q = question(QuestionType::Text, 10.0, vec![field(1, "Paris", false)]);
        assert_eq!(score(&q, 1, &one("paris")).unwrap(), 0.0);
        assert_eq!(score(&q, 1, &one("Paris ")).unwrap(), 0.0);
    }

    #[test]
    fn radio_requires_the_correct_field() {
        let q = question(
            QuestionType::Radio,
            8.0,
            vec![field(1, "red", false), field(2, "blue", true)],
        );
        assert_eq!(score(&q, 2, &one("blue")).unwrap(), 8.0);
        // Matching value on a field that is not flagged correct earns nothing.
        assert_eq!(score(&q, 1, &one("red")).unwrap(), 0.0);
    }

    #[test]
    fn checkbox_partial_credit() {
        let q = question(
            QuestionType::Checkbox,
            10.0,
            vec![
                field(1, "a", true),
                field(2, "b", true),
                field(3, "c", false),
            ],
        );
        // One correct plus one incorrect selection: half the points, the
        // wrong pick is ignored rather than penalized.
        assert_eq!(score(&q, 1, &many(&["a", "c"])).unwrap(), 5.0);
        assert_eq!(score(&q, 1, &many(&["a", "b"])).unwrap(), 10.0);
        assert_eq!(score(&q, 1, &many(&["c"])).unwrap(), 0.0);
    }

    #[test]
    fn checkbox_duplicates_do_not_inflate() {
        let q = question(
            QuestionType::Checkbox,
            10.0,
            vec![field(1, "a", true), field(2, "b", true)],
        );
        assert_eq!(score(&q, 1, &many(&["a", "a"])).unwrap(), 5.0);
    }

    #[test]
    fn checkbox_without_correct_fields_scores_zero() {
        let q = question(
            QuestionType::Checkbox,
            10.0,
            vec![field(1, "a", false), field(2, "b", false)],
        );
        assert_eq!(score(&q, 1, &many(&["a", "b"])).unwrap(), 0.0);
    }

    #[test]
    fn unknown_field_is_not_found() {
        let q = question(QuestionType::Text, 10.0, vec![field(1, "Paris", false)]);
        let err = score(&q, 99, &one("Paris")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
