// src/exam/recorder.rs

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{attempt, scorer};
use crate::models::exam_result::ExamResult;

/// Scores the live attempt, appends its result and clears attempt and buffer,
/// all in one transaction.
///
/// Deleting the attempt row is the claim: a finalizer that finds no row
/// returns `None` and writes nothing, so racing callers record one result.
pub async fn finalize(
    pool: &SqlitePool,
    student_id: i64,
    category: &str,
    now: DateTime<Utc>,
) -> Result<Option<ExamResult>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some((started, answers)) = attempt::take_attempt(&mut *tx, student_id, category).await?
    else {
        tx.rollback().await?;
        return Ok(None);
    };

    let score = scorer::score_answers(&mut *tx, category, &answers).await?;

    let result = sqlx::query_as::<_, ExamResult>(
        r#"
        INSERT INTO exam_results
            (student_id, category, score, correct_answers, total_questions, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, student_id, category, score, correct_answers, total_questions, created_at
        "#,
    )
    .bind(student_id)
    .bind(category)
    .bind(score.percentage)
    .bind(score.correct as i64)
    .bind(score.total as i64)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        student_id,
        category,
        started_at = %started.start_time,
        score = result.score,
        correct = result.correct_answers,
        total = result.total_questions,
        "Exam attempt finalized"
    );

    Ok(Some(result))
}

pub async fn fetch_student_results(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Vec<ExamResult>, sqlx::Error> {
    sqlx::query_as::<_, ExamResult>(
        r#"
        SELECT id, student_id, category, score, correct_answers, total_questions, created_at
        FROM exam_results
        WHERE student_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}
