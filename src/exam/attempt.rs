// src/exam/attempt.rs

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor};

use crate::{
    error::ExamError,
    models::attempt::{Attempt, AnswerMap, BufferedAnswer, BufferedAnswerRow},
};

pub async fn fetch_attempt<'e>(
    executor: impl SqliteExecutor<'e>,
    student_id: i64,
    category: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        r#"
        SELECT student_id, category, start_time
        FROM exam_attempts
        WHERE student_id = ? AND category = ?
        "#,
    )
    .bind(student_id)
    .bind(category)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_student_attempts<'e>(
    executor: impl SqliteExecutor<'e>,
    student_id: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        "SELECT student_id, category, start_time FROM exam_attempts WHERE student_id = ?",
    )
    .bind(student_id)
    .fetch_all(executor)
    .await
}

/// Number of finalized attempts, i.e. result rows, for the pair.
pub async fn count_results<'e>(
    executor: impl SqliteExecutor<'e>,
    student_id: i64,
    category: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM exam_results WHERE student_id = ? AND category = ?",
    )
    .bind(student_id)
    .bind(category)
    .fetch_one(executor)
    .await
}

/// Inserts the attempt row. The composite primary key turns a concurrent
/// duplicate into `AlreadyAttempting`.
pub async fn insert_attempt<'e>(
    executor: impl SqliteExecutor<'e>,
    student_id: i64,
    category: &str,
    now: DateTime<Utc>,
) -> Result<Attempt, ExamError> {
    sqlx::query("INSERT INTO exam_attempts (student_id, category, start_time) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(category)
        .bind(now)
        .execute(executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ExamError::AlreadyAttempting
            }
            e => ExamError::Storage(e),
        })?;

    Ok(Attempt {
        student_id,
        category: category.to_string(),
        start_time: now,
    })
}

/// Removes the attempt and its buffered answers on the caller's connection.
///
/// The buffer is deleted first so its rows can be handed back for scoring.
/// Returns `None` when there was no attempt; the caller must then roll back.
pub async fn take_attempt(
    conn: &mut SqliteConnection,
    student_id: i64,
    category: &str,
) -> Result<Option<(Attempt, AnswerMap)>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BufferedAnswerRow>(
        r#"
        DELETE FROM buffered_answers
        WHERE student_id = ? AND category = ?
        RETURNING question_id, answer, is_doubtful
        "#,
    )
    .bind(student_id)
    .bind(category)
    .fetch_all(&mut *conn)
    .await?;

    let attempt = sqlx::query_as::<_, Attempt>(
        r#"
        DELETE FROM exam_attempts
        WHERE student_id = ? AND category = ?
        RETURNING student_id, category, start_time
        "#,
    )
    .bind(student_id)
    .bind(category)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(attempt.map(|a| (a, rows_to_map(rows))))
}

pub fn rows_to_map(rows: Vec<BufferedAnswerRow>) -> AnswerMap {
    rows.into_iter()
        .map(|r| {
            (
                r.question_id,
                BufferedAnswer {
                    answer: r.answer,
                    doubtful: r.is_doubtful,
                },
            )
        })
        .collect()
}
