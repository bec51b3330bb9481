// src/models/schedule.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'exam_schedules' table in the database.
/// A category without a schedule row runs in practice mode.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Schedule {
    pub category: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub max_attempts: i64,
}

/// Availability of a category at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    NotOpenYet,
    Open,
    Closed,
    /// No schedule: untimed, unlimited attempts.
    Practice,
}

/// DTO for creating or replacing a category's schedule.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertScheduleRequest {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i64,
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: i64,
}

impl UpsertScheduleRequest {
    pub fn window_is_valid(&self) -> bool {
        self.close_time > self.open_time
    }
}
