// src/exam/mod.rs
//
// Exam attempt lifecycle: schedule gating, attempt tracking, the answer
// buffer, deadline evaluation, scoring and result recording.

pub mod attempt;
pub mod buffer;
pub mod deadline;
pub mod questions;
pub mod recorder;
pub mod schedule;
pub mod scorer;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{
    error::ExamError,
    models::{
        attempt::{AnswerMap, Attempt, BufferedAnswer},
        exam_result::ExamResult,
        schedule::ScheduleStatus,
    },
};
use buffer::AnswerBuffer;
use deadline::AttemptClock;
use scorer::Score;

/// Row used by the expiry sweeps.
#[derive(sqlx::FromRow)]
struct TimedAttempt {
    student_id: i64,
    category: String,
    start_time: DateTime<Utc>,
    duration_minutes: i64,
}

/// Entry point used by the HTTP layer for everything touching an attempt.
///
/// Callers pass `now` explicitly; every operation that reads an attempt
/// should be preceded by `check_expired_and_finalize` for the same pair.
#[derive(Clone)]
pub struct ExamCore {
    pool: SqlitePool,
    buffer: AnswerBuffer,
}

impl ExamCore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            buffer: AnswerBuffer::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn resolve_schedule(
        &self,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduleStatus, ExamError> {
        let schedule = schedule::fetch_schedule(&self.pool, category).await?;
        Ok(schedule::resolve(schedule.as_ref(), now))
    }

    /// Starts an attempt.
    ///
    /// An expired attempt for the pair is finalized first, so its result
    /// counts towards the limit checked here.
    pub async fn start_attempt(
        &self,
        student_id: i64,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<Attempt, ExamError> {
        self.check_expired_and_finalize(student_id, category, now)
            .await?;

        if attempt::fetch_attempt(&self.pool, student_id, category)
            .await?
            .is_some()
        {
            return Err(ExamError::AlreadyAttempting);
        }

        let schedule = schedule::fetch_schedule(&self.pool, category).await?;
        if let Some(s) = &schedule {
            let used = attempt::count_results(&self.pool, student_id, category).await?;
            if used >= s.max_attempts {
                return Err(ExamError::AttemptLimitExceeded);
            }
        }

        match schedule::resolve(schedule.as_ref(), now) {
            ScheduleStatus::NotOpenYet | ScheduleStatus::Closed => {
                return Err(ExamError::WindowClosed);
            }
            ScheduleStatus::Open | ScheduleStatus::Practice => {}
        }

        let started = attempt::insert_attempt(&self.pool, student_id, category, now).await?;
        self.buffer.forget(student_id, category).await;

        tracing::info!(student_id, category, "Exam attempt started");
        Ok(started)
    }

    pub async fn get_live_attempt(
        &self,
        student_id: i64,
        category: &str,
    ) -> Result<Option<Attempt>, ExamError> {
        Ok(attempt::fetch_attempt(&self.pool, student_id, category).await?)
    }

    /// Deletes the attempt and its buffer together, without recording a result.
    pub async fn clear_attempt(&self, student_id: i64, category: &str) -> Result<bool, ExamError> {
        let take = async {
            let mut tx = self.pool.begin().await?;
            let cleared = attempt::take_attempt(&mut *tx, student_id, category)
                .await?
                .is_some();
            tx.commit().await?;
            Ok::<_, sqlx::Error>(cleared)
        };
        Ok(self.buffer.retire(student_id, category, take).await?)
    }

    /// Timer state of an attempt under its category's current schedule.
    pub async fn attempt_clock(
        &self,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptClock, ExamError> {
        let schedule = schedule::fetch_schedule(&self.pool, &attempt.category).await?;
        Ok(deadline::evaluate(attempt, schedule.as_ref(), now))
    }

    pub async fn save_answer(
        &self,
        student_id: i64,
        category: &str,
        question_id: i64,
        answer: Option<String>,
        doubtful: bool,
    ) -> Result<(), ExamError> {
        self.buffer
            .save_one(&self.pool, student_id, category, question_id, answer, doubtful)
            .await
    }

    /// Atomic batch save. Returns how many rows were written.
    pub async fn save_answers<I>(
        &self,
        student_id: i64,
        category: &str,
        answers: I,
    ) -> Result<usize, ExamError>
    where
        I: IntoIterator<Item = (i64, BufferedAnswer)>,
    {
        self.buffer
            .save_batch(&self.pool, student_id, category, answers)
            .await
    }

    pub async fn load_answers(
        &self,
        student_id: i64,
        category: &str,
    ) -> Result<AnswerMap, ExamError> {
        self.buffer.load_all(&self.pool, student_id, category).await
    }

    /// Grades the current buffer without finalizing.
    pub async fn score(&self, student_id: i64, category: &str) -> Result<Score, ExamError> {
        let answers = self.load_answers(student_id, category).await?;
        Ok(scorer::score_answers(&self.pool, category, &answers).await?)
    }

    /// Finalizes the pair's attempt if its deadline has passed.
    ///
    /// Returns the recorded result when this call did the finalization, and
    /// `None` when there is no attempt, it is still running, or another
    /// caller finalized it first.
    pub async fn check_expired_and_finalize(
        &self,
        student_id: i64,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExamResult>, ExamError> {
        let Some(live) = attempt::fetch_attempt(&self.pool, student_id, category).await? else {
            return Ok(None);
        };

        if !self.attempt_clock(&live, now).await?.is_expired() {
            return Ok(None);
        }

        let result = self.finalize(student_id, category, now).await?;
        if result.is_some() {
            tracing::info!(student_id, category, "Expired attempt auto-submitted");
        }
        Ok(result)
    }

    /// Explicit submission. A second submission, or one racing a timeout that
    /// already won, fails with `NoLiveAttempt` and records nothing.
    pub async fn submit_now(
        &self,
        student_id: i64,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<ExamResult, ExamError> {
        self.finalize(student_id, category, now)
            .await?
            .ok_or(ExamError::NoLiveAttempt)
    }

    async fn finalize(
        &self,
        student_id: i64,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ExamResult>, ExamError> {
        let finalize = recorder::finalize(&self.pool, student_id, category, now);
        Ok(self.buffer.retire(student_id, category, finalize).await?)
    }

    /// Finalizes every expired attempt of one student.
    pub async fn finalize_expired_for_student(
        &self,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExamResult>, ExamError> {
        let timed = sqlx::query_as::<_, TimedAttempt>(
            r#"
            SELECT a.student_id, a.category, a.start_time, s.duration_minutes
            FROM exam_attempts a
            JOIN exam_schedules s ON s.category = a.category
            WHERE a.student_id = ?
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        let mut finalized = Vec::new();
        for t in timed {
            if now < deadline::deadline(t.start_time, t.duration_minutes) {
                continue;
            }
            if let Some(result) = self.finalize(t.student_id, &t.category, now).await? {
                tracing::info!(student_id, category = %t.category, "Expired attempt auto-submitted");
                finalized.push(result);
            }
        }
        Ok(finalized)
    }

    /// Finalizes every expired attempt in the system. Failures are logged and
    /// skipped so that one bad pair does not block the rest.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, ExamError> {
        let timed = sqlx::query_as::<_, TimedAttempt>(
            r#"
            SELECT a.student_id, a.category, a.start_time, s.duration_minutes
            FROM exam_attempts a
            JOIN exam_schedules s ON s.category = a.category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut count = 0;
        for t in timed {
            if now < deadline::deadline(t.start_time, t.duration_minutes) {
                continue;
            }
            match self.finalize(t.student_id, &t.category, now).await {
                Ok(Some(_)) => count += 1,
                Ok(None) => {}
                Err(e) => tracing::error!(
                    student_id = t.student_id,
                    category = %t.category,
                    "Failed to finalize expired attempt: {}",
                    e
                ),
            }
        }

        if count > 0 {
            tracing::info!(count, "Sweep finalized expired attempts");
        }
        Ok(count)
    }
}

/// Runs `sweep_expired` every `interval` until the runtime shuts down.
pub fn spawn_sweeper(core: ExamCore, interval: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = core.sweep_expired(Utc::now()).await {
                tracing::error!("Expired attempt sweep failed: {}", e);
            }
        }
    })
}
