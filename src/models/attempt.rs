// src/models/attempt.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::{
    exam_result::ExamResult,
    question::PublicQuestion,
    schedule::{Schedule, ScheduleStatus},
};

/// Represents the 'exam_attempts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub student_id: i64,
    pub category: String,
    pub start_time: DateTime<Utc>,
}

/// A working answer held for a live attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BufferedAnswer {
    pub answer: Option<String>,
    pub doubtful: bool,
}

/// Row shape of 'buffered_answers'.
#[derive(Debug, FromRow)]
pub struct BufferedAnswerRow {
    pub question_id: i64,
    pub answer: Option<String>,
    pub is_doubtful: bool,
}

/// question_id -> working answer.
pub type AnswerMap = HashMap<i64, BufferedAnswer>;

/// Longest answer accepted; option texts are capped at the same length.
pub const MAX_ANSWER_LEN: usize = 500;

/// DTO for saving one answer.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    #[validate(length(max = 500))]
    pub answer: Option<String>,
    #[serde(default)]
    pub doubtful: bool,
}

/// DTO for saving many answers at once. Keys are question ids.
#[derive(Debug, Deserialize, Default, Validate)]
pub struct SaveAnswersRequest {
    #[serde(default)]
    #[validate(custom(function = validate_answer_lengths))]
    pub answers: BTreeMap<i64, BufferedAnswer>,
}

fn validate_answer_lengths(answers: &BTreeMap<i64, BufferedAnswer>) -> Result<(), ValidationError> {
    let too_long = answers
        .values()
        .filter_map(|a| a.answer.as_deref())
        .any(|a| a.chars().count() > MAX_ANSWER_LEN);
    if too_long {
        let mut err = ValidationError::new("answer_too_long");
        err.message = Some(format!("Answers are limited to {} characters.", MAX_ANSWER_LEN).into());
        return Err(err);
    }
    Ok(())
}

/// Timer information for a live attempt.
#[derive(Debug, Serialize)]
pub struct AttemptView {
    pub start_time: DateTime<Utc>,
    /// `None` in practice mode.
    pub deadline: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
}

/// Everything the exam page needs after a reload.
#[derive(Debug, Serialize)]
pub struct ExamViewResponse {
    pub category: String,
    pub status: ScheduleStatus,
    pub attempt: Option<AttemptView>,
    pub questions: Vec<PublicQuestion>,
    pub answers: AnswerMap,
    /// Set when this request found the attempt expired and submitted it.
    pub finalized: Option<ExamResult>,
}

/// One card of the exam list.
#[derive(Debug, Serialize)]
pub struct ExamSummary {
    pub category: String,
    pub status: ScheduleStatus,
    pub question_count: i64,
    pub attempts_used: i64,
    pub max_attempts: Option<i64>,
    pub duration_minutes: Option<i64>,
    pub in_progress: bool,
}

impl ExamSummary {
    pub fn new(
        category: String,
        question_count: i64,
        schedule: Option<&Schedule>,
        status: ScheduleStatus,
        attempts_used: i64,
        in_progress: bool,
    ) -> Self {
        Self {
            category,
            status,
            question_count,
            attempts_used,
            max_attempts: schedule.map(|s| s.max_attempts),
            duration_minutes: schedule.map(|s| s.duration_minutes),
            in_progress,
        }
    }
}
