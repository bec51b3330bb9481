// src/models/exam_result.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'exam_results' table in the database.
/// One immutable row per finalized attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ExamResult {
    pub id: i64,
    pub student_id: i64,
    pub category: String,
    /// Percentage in 0..=100.
    pub score: f64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub created_at: DateTime<Utc>,
}

/// Result row joined with the student's account, for the admin report.
#[derive(Debug, Serialize, FromRow)]
pub struct ResultReportEntry {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub category: String,
    pub score: f64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub created_at: DateTime<Utc>,
}

/// A student's own report card.
#[derive(Debug, Serialize)]
pub struct MyResultsResponse {
    pub exams_taken: usize,
    pub average_score: f64,
    pub results: Vec<ExamResult>,
}

impl MyResultsResponse {
    pub fn new(results: Vec<ExamResult>) -> Self {
        let average_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64
        };
        Self {
            exams_taken: results.len(),
            average_score,
            results,
        }
    }
}
