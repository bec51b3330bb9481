// src/handlers/results.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;

use crate::{
    error::AppError,
    exam::{ExamCore, recorder},
    models::exam_result::MyResultsResponse,
    utils::jwt::Claims,
};

/// The caller's report card: every result, newest first, with the average.
pub async fn my_results(
    State(exams): State<ExamCore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    exams
        .finalize_expired_for_student(student_id, Utc::now())
        .await?;
    let results = recorder::fetch_student_results(exams.pool(), student_id).await?;

    Ok(Json(MyResultsResponse::new(results)))
}
