// src/exam/deadline.rs

use chrono::{DateTime, Duration, Utc};

use crate::models::{attempt::Attempt, schedule::Schedule};

/// Timer state of a live attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptClock {
    /// Practice mode: no deadline.
    Untimed,
    Running {
        deadline: DateTime<Utc>,
        remaining: Duration,
    },
    Expired {
        deadline: DateTime<Utc>,
    },
}

impl AttemptClock {
    pub fn is_expired(&self) -> bool {
        matches!(self, AttemptClock::Expired { .. })
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self {
            AttemptClock::Untimed => None,
            AttemptClock::Running { deadline, .. } | AttemptClock::Expired { deadline } => {
                Some(*deadline)
            }
        }
    }

    /// Whole seconds left, clamped at zero. `None` when untimed.
    pub fn remaining_seconds(&self) -> Option<i64> {
        match self {
            AttemptClock::Untimed => None,
            AttemptClock::Running { remaining, .. } => Some(remaining.num_seconds().max(0)),
            AttemptClock::Expired { .. } => Some(0),
        }
    }
}

pub fn deadline(start_time: DateTime<Utc>, duration_minutes: i64) -> DateTime<Utc> {
    start_time + Duration::minutes(duration_minutes)
}

/// Evaluates an attempt against its category's schedule.
/// The attempt is expired once `now` reaches `start_time + duration_minutes`.
pub fn evaluate(
    attempt: &Attempt,
    schedule: Option<&Schedule>,
    now: DateTime<Utc>,
) -> AttemptClock {
    let Some(schedule) = schedule else {
        return AttemptClock::Untimed;
    };

    let deadline = deadline(attempt.start_time, schedule.duration_minutes);
    if now >= deadline {
        AttemptClock::Expired { deadline }
    } else {
        AttemptClock::Running {
            deadline,
            remaining: deadline - now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attempt_at(start: DateTime<Utc>) -> Attempt {
        Attempt {
            student_id: 1,
            category: "Math".to_string(),
            start_time: start,
        }
    }

    fn schedule(duration_minutes: i64) -> Schedule {
        Schedule {
            category: "Math".to_string(),
            open_time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            close_time: Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap(),
            duration_minutes,
            max_attempts: 3,
        }
    }

    #[test]
    fn running_then_expired() {
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let a = attempt_at(t);
        let s = schedule(10);

        let clock = evaluate(&a, Some(&s), t + Duration::minutes(4));
        assert_eq!(clock.remaining_seconds(), Some(360));
        assert!(!clock.is_expired());

        let clock = evaluate(&a, Some(&s), t + Duration::minutes(10));
        assert!(clock.is_expired());
        assert_eq!(clock.remaining_seconds(), Some(0));
        assert_eq!(clock.deadline(), Some(t + Duration::minutes(10)));
    }

    #[test]
    fn practice_never_expires() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let clock = evaluate(&attempt_at(t), None, Utc::now());
        assert_eq!(clock, AttemptClock::Untimed);
        assert_eq!(clock.remaining_seconds(), None);
    }
}
