// src/exam/buffer.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::attempt::{fetch_attempt, rows_to_map};
use crate::{
    error::ExamError,
    models::attempt::{AnswerMap, BufferedAnswer, BufferedAnswerRow},
};

type PairKey = (i64, String);
type Slot = Arc<AsyncMutex<AnswerMap>>;

/// Pairs mirrored at once before idle slots are evicted.
const MAX_MIRRORED_PAIRS: usize = 4096;

/// Upsert guarded by the owning attempt and by the question's category.
/// A missing answer keeps the stored one and only updates the doubtful flag.
const UPSERT_ANSWER: &str = r#"
    INSERT INTO buffered_answers (student_id, category, question_id, answer, is_doubtful)
    SELECT ?1, ?2, ?3, ?4, ?5
    WHERE EXISTS (
        SELECT 1 FROM exam_attempts WHERE student_id = ?1 AND category = ?2
    )
    AND EXISTS (
        SELECT 1 FROM questions WHERE id = ?3 AND category = ?2
    )
    ON CONFLICT (student_id, category, question_id) DO UPDATE SET
        answer = COALESCE(excluded.answer, buffered_answers.answer),
        is_doubtful = excluded.is_doubtful
"#;

/// Write-through buffer of working answers.
///
/// The database is the source of truth. The in-process mirror remembers what
/// was last written or read for each (student, category) so that a repeated
/// identical write is skipped.
///
/// Every operation on a pair holds that pair's slot lock from the mirror
/// check through the durable write to the mirror update, so the mirror never
/// runs behind the rows. Slots nobody holds may be evicted at any time; a
/// missing slot only means the next write is not skipped.
#[derive(Clone, Default)]
pub struct AnswerBuffer {
    slots: Arc<Mutex<HashMap<PairKey, Slot>>>,
}

impl AnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PairKey, Slot>> {
        // The map only holds handles; a poisoned one is still consistent.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, key: &PairKey) -> Slot {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(key) {
            return slot.clone();
        }
        if slots.len() >= MAX_MIRRORED_PAIRS {
            // Only the map refers to an idle slot.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        let slot = Slot::default();
        slots.insert(key.clone(), slot.clone());
        slot
    }

    /// Locks the pair's mirror. A slot that was forgotten or evicted while
    /// this caller waited is no longer current, so the lookup is retried.
    async fn acquire(&self, key: &PairKey) -> OwnedMutexGuard<AnswerMap> {
        loop {
            let slot = self.slot(key);
            let guard = slot.clone().lock_owned().await;
            let current = self
                .lock()
                .get(key)
                .is_some_and(|held| Arc::ptr_eq(held, &slot));
            if current {
                return guard;
            }
        }
    }

    /// Number of pairs currently mirrored.
    pub fn mirrored_pairs(&self) -> usize {
        self.lock().len()
    }

    /// Drops the pair's mirror once no operation on it is in flight.
    pub async fn forget(&self, student_id: i64, category: &str) {
        let key = (student_id, category.to_string());
        let _guard = self.acquire(&key).await;
        self.lock().remove(&key);
    }

    /// Runs `end` with the pair's slot held, then drops the mirror.
    /// Saves for the pair wait until the attempt is gone and then fail.
    pub async fn retire<F, T>(&self, student_id: i64, category: &str, end: F) -> T
    where
        F: Future<Output = T>,
    {
        let key = (student_id, category.to_string());
        let _guard = self.acquire(&key).await;
        let out = end.await;
        self.lock().remove(&key);
        out
    }

    /// Upserts one answer. Replaying the same value is a no-op.
    pub async fn save_one(
        &self,
        pool: &SqlitePool,
        student_id: i64,
        category: &str,
        question_id: i64,
        answer: Option<String>,
        doubtful: bool,
    ) -> Result<(), ExamError> {
        let key = (student_id, category.to_string());
        let incoming = BufferedAnswer {
            answer: normalize(answer),
            doubtful,
        };

        let mut mirror = self.acquire(&key).await;
        if is_redundant(&mirror, question_id, &incoming) {
            tracing::debug!(student_id, category, question_id, "Skipping redundant answer write");
            return Ok(());
        }

        let mut conn = pool.acquire().await?;
        upsert(&mut *conn, student_id, category, question_id, &incoming).await?;
        remember(&mut mirror, question_id, &incoming);
        Ok(())
    }

    /// Upserts many answers in one transaction.
    ///
    /// Entries without an answer are skipped. Any failure rolls the whole
    /// batch back and leaves the mirror untouched.
    pub async fn save_batch<I>(
        &self,
        pool: &SqlitePool,
        student_id: i64,
        category: &str,
        answers: I,
    ) -> Result<usize, ExamError>
    where
        I: IntoIterator<Item = (i64, BufferedAnswer)>,
    {
        let key = (student_id, category.to_string());
        let mut mirror = self.acquire(&key).await;

        let pending: Vec<(i64, BufferedAnswer)> = answers
            .into_iter()
            .filter_map(|(q_id, a)| {
                normalize(a.answer).map(|ans| {
                    (
                        q_id,
                        BufferedAnswer {
                            answer: Some(ans),
                            doubtful: a.doubtful,
                        },
                    )
                })
            })
            .filter(|(q_id, a)| !is_redundant(&mirror, *q_id, a))
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        for (question_id, answer) in &pending {
            upsert(&mut *tx, student_id, category, *question_id, answer).await?;
        }
        tx.commit().await?;

        for (question_id, answer) in &pending {
            remember(&mut mirror, *question_id, answer);
        }

        tracing::debug!(student_id, category, written = pending.len(), "Answer batch flushed");
        Ok(pending.len())
    }

    /// Reads the durable buffer and replaces the mirror with it.
    pub async fn load_all(
        &self,
        pool: &SqlitePool,
        student_id: i64,
        category: &str,
    ) -> Result<AnswerMap, ExamError> {
        let key = (student_id, category.to_string());
        let mut mirror = self.acquire(&key).await;

        let rows = sqlx::query_as::<_, BufferedAnswerRow>(
            r#"
            SELECT question_id, answer, is_doubtful
            FROM buffered_answers
            WHERE student_id = ? AND category = ?
            "#,
        )
        .bind(student_id)
        .bind(category)
        .fetch_all(pool)
        .await?;

        let answers = rows_to_map(rows);
        *mirror = answers.clone();
        Ok(answers)
    }
}

/// True when the mirror already holds exactly what `incoming` would store.
fn is_redundant(mirror: &AnswerMap, question_id: i64, incoming: &BufferedAnswer) -> bool {
    match mirror.get(&question_id) {
        Some(current) => {
            let answer = incoming.answer.as_ref().or(current.answer.as_ref());
            answer == current.answer.as_ref() && incoming.doubtful == current.doubtful
        }
        None => false,
    }
}

fn remember(mirror: &mut AnswerMap, question_id: i64, incoming: &BufferedAnswer) {
    let entry = mirror.entry(question_id).or_default();
    if incoming.answer.is_some() {
        entry.answer = incoming.answer.clone();
    }
    entry.doubtful = incoming.doubtful;
}

/// Blank selections carry no answer.
fn normalize(answer: Option<String>) -> Option<String> {
    answer.filter(|a| !a.is_empty())
}

async fn upsert(
    conn: &mut SqliteConnection,
    student_id: i64,
    category: &str,
    question_id: i64,
    answer: &BufferedAnswer,
) -> Result<(), ExamError> {
    let done = sqlx::query(UPSERT_ANSWER)
        .bind(student_id)
        .bind(category)
        .bind(question_id)
        .bind(answer.answer.as_deref())
        .bind(answer.doubtful)
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() > 0 {
        return Ok(());
    }

    if fetch_attempt(&mut *conn, student_id, category).await?.is_none() {
        return Err(ExamError::NoLiveAttempt);
    }
    Err(ExamError::UnknownQuestion(question_id))
}
