// src/exam/scorer.rs

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqliteExecutor;

use crate::models::attempt::AnswerMap;

/// Outcome of grading one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    answer: String,
}

/// Compares answers to keys by exact string equality.
///
/// Every key counts towards the total, answered or not. An empty key set
/// scores 0.
pub fn calculate_score(
    user_answers: &HashMap<i64, String>,
    answer_keys: &HashMap<i64, String>,
) -> Score {
    let total = answer_keys.len();

    if total == 0 {
        return Score {
            correct: 0,
            total: 0,
            percentage: 0.0,
        };
    }

    let correct = answer_keys
        .iter()
        .filter(|&(q_id, key)| user_answers.get(q_id) == Some(key))
        .count();

    Score {
        correct,
        total,
        percentage: (correct as f64 / total as f64) * 100.0,
    }
}

pub async fn fetch_answer_keys<'e>(
    executor: impl SqliteExecutor<'e>,
    category: &str,
) -> Result<HashMap<i64, String>, sqlx::Error> {
    let keys = sqlx::query_as::<_, AnswerKey>("SELECT id, answer FROM questions WHERE category = ?")
        .bind(category)
        .fetch_all(executor)
        .await?;

    Ok(keys.into_iter().map(|k| (k.id, k.answer)).collect())
}

/// Grades buffered answers against the category's current answer keys.
pub async fn score_answers<'e>(
    executor: impl SqliteExecutor<'e>,
    category: &str,
    answers: &AnswerMap,
) -> Result<Score, sqlx::Error> {
    let keys = fetch_answer_keys(executor, category).await?;
    let selected: HashMap<i64, String> = answers
        .iter()
        .filter_map(|(id, a)| a.answer.clone().map(|ans| (*id, ans)))
        .collect();

    Ok(calculate_score(&selected, &keys))
}
