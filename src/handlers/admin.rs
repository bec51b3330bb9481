// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::DEFAULT_SUB_CATEGORY,
    error::AppError,
    exam::{questions, schedule},
    models::{
        exam_result::ResultReportEntry,
        question::{CreateQuestionRequest, Question, validate_category},
        schedule::UpsertScheduleRequest,
        user::{AdminCreateUserRequest, User},
    },
    utils::{hash::hash_password, html::clean_html},
};

use super::auth::map_user_insert_error;

fn check_category(category: &str) -> Result<(), AppError> {
    validate_category(category)
        .map_err(|_| AppError::BadRequest(format!("Invalid category '{}'", category)))
}

/// Creates a user with a specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, name)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, role, name
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .bind(&payload.name)
    .fetch_one(&pool)
    .await
    .map_err(|e| map_user_insert_error(e, &payload.username))?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Lists every schedule.
pub async fn list_schedules(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let schedules = schedule::fetch_all_schedules(&pool).await?;
    Ok(Json(schedules))
}

/// Creates or replaces the schedule of a category.
///
/// Running attempts keep their start time; a changed duration applies to
/// their deadline from the next check on.
pub async fn upsert_schedule(
    State(pool): State<SqlitePool>,
    Path(category): Path<String>,
    Json(payload): Json<UpsertScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_category(&category)?;
    payload.validate()?;
    if !payload.window_is_valid() {
        return Err(AppError::BadRequest(
            "close_time must be after open_time".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO exam_schedules (category, open_time, close_time, duration_minutes, max_attempts)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (category) DO UPDATE SET
            open_time = excluded.open_time,
            close_time = excluded.close_time,
            duration_minutes = excluded.duration_minutes,
            max_attempts = excluded.max_attempts
        "#,
    )
    .bind(&category)
    .bind(payload.open_time)
    .bind(payload.close_time)
    .bind(payload.duration_minutes)
    .bind(payload.max_attempts)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert schedule: {:?}", e);
        AppError::from(e)
    })?;

    let saved = schedule::fetch_schedule(&pool, &category)
        .await?
        .ok_or(AppError::InternalServerError("Schedule vanished after upsert".to_string()))?;

    tracing::info!(category = %category, "Schedule saved");
    Ok(Json(saved))
}

/// Removes a schedule, turning the category into practice mode.
pub async fn delete_schedule(
    State(pool): State<SqlitePool>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exam_schedules WHERE category = ?")
        .bind(&category)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Schedule not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub category: String,
}

/// Lists a category's questions including answer keys.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let list = questions::fetch_questions(&pool, &params.category).await?;
    Ok(Json(list))
}

/// Creates a new question.
/// The content is sanitized; the answer key must be one of the option texts.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if !payload.answer_matches_option() {
        return Err(AppError::BadRequest(
            "answer must match one of the options".to_string(),
        ));
    }

    let sub_category = payload
        .sub_category
        .clone()
        .unwrap_or_else(|| DEFAULT_SUB_CATEGORY.to_string());

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (category, sub_category, content, image_url, options, answer)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id, category, sub_category, content, image_url, options, answer
        "#,
    )
    .bind(&payload.category)
    .bind(&sub_category)
    .bind(clean_html(&payload.content))
    .bind(&payload.image_url)
    .bind(SqlJson(payload.options.clone()))
    .bind(&payload.answer)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::from(e)
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Deletes a question by ID.
/// Buffered answers to it disappear with it.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// All results with the student's account, newest first.
pub async fn list_results(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let results = sqlx::query_as::<_, ResultReportEntry>(
        r#"
        SELECT r.id, u.username, u.name, r.category, r.score,
               r.correct_answers, r.total_questions, r.created_at
        FROM exam_results r
        JOIN users u ON u.id = r.student_id
        ORDER BY r.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch results: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(results))
}
