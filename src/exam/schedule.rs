// src/exam/schedule.rs

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use crate::models::schedule::{Schedule, ScheduleStatus};

/// Decides whether a category can be taken at `now`.
///
/// Both window bounds are inclusive. A missing schedule means practice mode.
pub fn resolve(schedule: Option<&Schedule>, now: DateTime<Utc>) -> ScheduleStatus {
    match schedule {
        None => ScheduleStatus::Practice,
        Some(s) if now < s.open_time => ScheduleStatus::NotOpenYet,
        Some(s) if now > s.close_time => ScheduleStatus::Closed,
        Some(_) => ScheduleStatus::Open,
    }
}

pub async fn fetch_schedule<'e>(
    executor: impl SqliteExecutor<'e>,
    category: &str,
) -> Result<Option<Schedule>, sqlx::Error> {
    sqlx::query_as::<_, Schedule>(
        r#"
        SELECT category, open_time, close_time, duration_minutes, max_attempts
        FROM exam_schedules
        WHERE category = ?
        "#,
    )
    .bind(category)
    .fetch_optional(executor)
    .await
}

pub async fn fetch_all_schedules<'e>(
    executor: impl SqliteExecutor<'e>,
) -> Result<Vec<Schedule>, sqlx::Error> {
    sqlx::query_as::<_, Schedule>(
        r#"
        SELECT category, open_time, close_time, duration_minutes, max_attempts
        FROM exam_schedules
        ORDER BY category
        "#,
    )
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn schedule() -> Schedule {
        Schedule {
            category: "Math".to_string(),
            open_time: Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap(),
            close_time: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
            duration_minutes: 60,
            max_attempts: 1,
        }
    }

    #[test]
    fn no_schedule_is_practice() {
        assert_eq!(resolve(None, Utc::now()), ScheduleStatus::Practice);
    }

    #[test]
    fn window_boundaries() {
        let s = schedule();
        assert_eq!(
            resolve(Some(&s), s.open_time - Duration::seconds(1)),
            ScheduleStatus::NotOpenYet
        );
        assert_eq!(resolve(Some(&s), s.open_time), ScheduleStatus::Open);
        assert_eq!(resolve(Some(&s), s.close_time), ScheduleStatus::Open);
        assert_eq!(
            resolve(Some(&s), s.close_time + Duration::seconds(1)),
            ScheduleStatus::Closed
        );
    }
}
