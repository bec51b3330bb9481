// src/handlers/exam.rs

use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    exam::{ExamCore, attempt, questions, schedule},
    models::{
        attempt::{
            AnswerMap, Attempt, AttemptView, ExamSummary, ExamViewResponse, SaveAnswerRequest,
            SaveAnswersRequest,
        },
        question::PublicQuestion,
    },
    utils::jwt::Claims,
};

#[derive(sqlx::FromRow)]
struct ResultCount {
    category: String,
    used: i64,
}

async fn attempt_view(
    exams: &ExamCore,
    live: &Attempt,
    now: chrono::DateTime<Utc>,
) -> Result<AttemptView, AppError> {
    let clock = exams.attempt_clock(live, now).await?;
    Ok(AttemptView {
        start_time: live.start_time,
        deadline: clock.deadline(),
        remaining_seconds: clock.remaining_seconds(),
    })
}

/// Rejects writes to an attempt that this request just found expired.
async fn ensure_running(
    exams: &ExamCore,
    student_id: i64,
    category: &str,
) -> Result<(), AppError> {
    if exams
        .check_expired_and_finalize(student_id, category, Utc::now())
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Exam time is over; your answers were submitted automatically".to_string(),
        ));
    }
    Ok(())
}

/// Lists exam categories with their availability for the caller.
///
/// Expired attempts of the caller are finalized first so that attempt
/// counts and "in progress" flags are current.
pub async fn list_exams(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let now = Utc::now();
    let pool = exams.pool();

    exams.finalize_expired_for_student(student_id, now).await?;

    let categories = questions::fetch_categories(pool).await?;
    let schedules: HashMap<String, _> = schedule::fetch_all_schedules(pool)
        .await?
        .into_iter()
        .map(|s| (s.category.clone(), s))
        .collect();
    let live: HashSet<String> = attempt::fetch_student_attempts(pool, student_id)
        .await?
        .into_iter()
        .map(|a| a.category)
        .collect();
    let used: HashMap<String, i64> = sqlx::query_as::<_, ResultCount>(
        r#"
        SELECT category, COUNT(*) AS used
        FROM exam_results
        WHERE student_id = ?
        GROUP BY category
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|r| (r.category, r.used))
    .collect();

    let summaries: Vec<ExamSummary> = categories
        .into_iter()
        .map(|c| {
            let sched = schedules.get(&c.category);
            let status = schedule::resolve(sched, now);
            let attempts_used = used.get(&c.category).copied().unwrap_or(0);
            let in_progress = live.contains(&c.category);
            ExamSummary::new(c.category, c.question_count, sched, status, attempts_used, in_progress)
        })
        .collect();

    Ok(Json(summaries))
}

/// Starts an attempt for the caller.
pub async fn start_exam(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let now = Utc::now();

    let started = exams.start_attempt(student_id, &category, now).await?;
    let view = attempt_view(&exams, &started, now).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Returns everything needed to (re)render the exam page.
///
/// Runs the deadline check first; when it fires, the response carries the
/// recorded result and no attempt.
pub async fn get_exam(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let now = Utc::now();

    let finalized = exams
        .check_expired_and_finalize(student_id, &category, now)
        .await?;
    let status = exams.resolve_schedule(&category, now).await?;

    let mut response = ExamViewResponse {
        category: category.clone(),
        status,
        attempt: None,
        questions: Vec::new(),
        answers: AnswerMap::new(),
        finalized,
    };

    if let Some(live) = exams.get_live_attempt(student_id, &category).await? {
        response.attempt = Some(attempt_view(&exams, &live, now).await?);
        response.questions = questions::fetch_questions(exams.pool(), &category)
            .await?
            .into_iter()
            .map(PublicQuestion::from)
            .collect();
        response.answers = exams.load_answers(student_id, &category).await?;
    }

    Ok(Json(response))
}

/// Saves one answer (selection or doubtful toggle).
pub async fn save_answer(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
    Path((category, question_id)): Path<(String, i64)>,
    Json(req): Json<SaveAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let student_id = claims.user_id()?;
    ensure_running(&exams, student_id, &category).await?;

    exams
        .save_answer(student_id, &category, question_id, req.answer, req.doubtful)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Flushes the client's answer buffer in one transaction.
pub async fn save_answers(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
    Path(category): Path<String>,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let student_id = claims.user_id()?;
    ensure_running(&exams, student_id, &category).await?;

    let saved = exams
        .save_answers(student_id, &category, req.answers)
        .await?;

    Ok(Json(json!({ "saved": saved })))
}

/// Flushes any final answers and submits the attempt.
///
/// If the deadline already passed, the attempt is submitted with what was
/// stored before it and the late answers are discarded.
pub async fn submit_exam(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
    Path(category): Path<String>,
    Json(req): Json<SaveAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let student_id = claims.user_id()?;
    let now = Utc::now();

    if let Some(result) = exams
        .check_expired_and_finalize(student_id, &category, now)
        .await?
    {
        return Ok(Json(json!({ "result": result, "auto_submitted": true })));
    }

    exams
        .save_answers(student_id, &category, req.answers)
        .await?;
    let result = exams.submit_now(student_id, &category, now).await?;

    Ok(Json(json!({ "result": result, "auto_submitted": false })))
}
