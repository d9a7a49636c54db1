use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::SessionError;
use crate::methodology::CategoryId;

/// The student a session is running for.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    /// Grade 1..=13
    pub grade: u8,
}

/// Lifecycle of a live session record. `NoSession` is the absence of a
/// record, not a phase. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    Paused,
    Ended,
}

/// One tutoring session. Elapsed time is never stored as a running counter:
/// `accumulated_seconds` holds banked time from closed segments and
/// `start_time_ms` anchors the open segment, so a reload mid-session
/// reconstructs elapsed time from wall-clock arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub student_id: Uuid,
    /// Grade 1..=13, validated at session start
    pub student_grade: u8,
    /// Session mode (e.g. "one_on_one", "small_group")
    pub mode: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub phase: SessionPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub goals: Vec<String>,
    /// Per-category incident counters. Incremented exactly once per logged
    /// incident, never decremented — resolution does not undo the count.
    pub discipline_state: BTreeMap<CategoryId, u32>,
    /// Time banked while not running
    pub accumulated_seconds: u64,
    /// Absolute start of the open segment, set only while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time_ms: Option<i64>,
}

/// Elapsed seconds as a pure function of the persisted timer fields.
/// Negative open segments (clock skew across a reload) clamp to zero
/// rather than un-banking time.
pub fn elapsed_seconds(
    accumulated: u64,
    start_time_ms: Option<i64>,
    now_ms: i64,
    running: bool,
) -> u64 {
    let open_segment = match (running, start_time_ms) {
        (true, Some(start)) => ((now_ms - start) / 1000).max(0) as u64,
        _ => 0,
    };
    accumulated + open_segment
}

impl Session {
    pub fn start(
        student_id: Uuid,
        student_grade: u8,
        mode: String,
        goals: Vec<String>,
        now: DateTime<Utc>,
        now_ms: i64,
    ) -> Session {
        let discipline_state = CategoryId::ALL.iter().map(|c| (*c, 0)).collect();
        Session {
            id: Uuid::now_v7(),
            student_id,
            student_grade,
            mode,
            started_at: now,
            ended_at: None,
            phase: SessionPhase::Active,
            goals,
            discipline_state,
            accumulated_seconds: 0,
            start_time_ms: Some(now_ms),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.phase, SessionPhase::Active | SessionPhase::Paused)
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Derived elapsed time. Safe to call on every tick, on visibility
    /// regain, and after a reload — it never depends on tick counts.
    pub fn elapsed(&self, now_ms: i64) -> u64 {
        elapsed_seconds(
            self.accumulated_seconds,
            self.start_time_ms,
            now_ms,
            self.is_running(),
        )
    }

    /// Fold the open segment into the bank and stop the clock.
    pub fn pause(&mut self, now_ms: i64) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Active => {
                self.accumulated_seconds = self.elapsed(now_ms);
                self.start_time_ms = None;
                self.phase = SessionPhase::Paused;
                Ok(())
            }
            SessionPhase::Paused => Err(SessionError::NotActive),
            SessionPhase::Ended => Err(SessionError::AlreadyEnded),
        }
    }

    /// Open a fresh segment from `now_ms`.
    pub fn resume(&mut self, now_ms: i64) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Paused => {
                self.start_time_ms = Some(now_ms);
                self.phase = SessionPhase::Active;
                Ok(())
            }
            SessionPhase::Active => Err(SessionError::NotPaused),
            SessionPhase::Ended => Err(SessionError::AlreadyEnded),
        }
    }

    /// Terminal transition. Banks the open segment so the final elapsed
    /// value survives in `accumulated_seconds`.
    pub fn end(&mut self, now: DateTime<Utc>, now_ms: i64) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Ended {
            return Err(SessionError::AlreadyEnded);
        }
        self.accumulated_seconds = self.elapsed(now_ms);
        self.start_time_ms = None;
        self.ended_at = Some(now);
        self.phase = SessionPhase::Ended;
        Ok(())
    }

    /// Bump the category counter. Returns the count before this incident,
    /// which is what the ladder rule consumes.
    pub fn record_incident(&mut self, category: CategoryId) -> u32 {
        let counter = self.discipline_state.entry(category).or_insert(0);
        let prior = *counter;
        *counter += 1;
        prior
    }

    pub fn category_count(&self, category: CategoryId) -> u32 {
        self.discipline_state.get(&category).copied().unwrap_or(0)
    }

    pub fn total_incidents(&self) -> u32 {
        self.discipline_state.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(now_ms: i64) -> Session {
        Session::start(
            Uuid::now_v7(),
            5,
            "one_on_one".to_string(),
            vec![],
            Utc::now(),
            now_ms,
        )
    }

    #[test]
    fn elapsed_reconstructs_from_timestamps() {
        // 120 banked seconds plus a 30-second open segment must read 150,
        // no matter how many ticks were missed while backgrounded.
        let now_ms = 1_000_000_000;
        assert_eq!(
            elapsed_seconds(120, Some(now_ms - 30_000), now_ms, true),
            150
        );
    }

    #[test]
    fn elapsed_ignores_stale_anchor_when_not_running() {
        let now_ms = 1_000_000_000;
        assert_eq!(elapsed_seconds(120, Some(now_ms - 30_000), now_ms, false), 120);
        assert_eq!(elapsed_seconds(120, None, now_ms, true), 120);
    }

    #[test]
    fn elapsed_clamps_negative_open_segment() {
        let now_ms = 1_000_000_000;
        // Clock went backwards across a reload; banked time must survive.
        assert_eq!(elapsed_seconds(120, Some(now_ms + 5_000), now_ms, true), 120);
    }

    #[test]
    fn pause_banks_the_open_segment() {
        let start = 1_000_000_000;
        let mut session = test_session(start);
        session.pause(start + 90_000).expect("pause from active");
        assert_eq!(session.accumulated_seconds, 90);
        assert_eq!(session.start_time_ms, None);
        assert_eq!(session.phase, SessionPhase::Paused);
        // Clock keeps still while paused.
        assert_eq!(session.elapsed(start + 500_000), 90);
    }

    #[test]
    fn resume_opens_a_fresh_segment() {
        let start = 1_000_000_000;
        let mut session = test_session(start);
        session.pause(start + 60_000).expect("pause");
        session.resume(start + 300_000).expect("resume");
        assert_eq!(session.elapsed(start + 330_000), 90);
    }

    #[test]
    fn end_is_terminal() {
        let start = 1_000_000_000;
        let mut session = test_session(start);
        session.end(Utc::now(), start + 10_000).expect("end");
        assert_eq!(session.accumulated_seconds, 10);
        assert_eq!(session.phase, SessionPhase::Ended);
        assert_eq!(session.pause(start + 20_000), Err(SessionError::AlreadyEnded));
        assert_eq!(session.resume(start + 20_000), Err(SessionError::AlreadyEnded));
        assert_eq!(
            session.end(Utc::now(), start + 20_000),
            Err(SessionError::AlreadyEnded)
        );
    }

    #[test]
    fn double_pause_and_double_resume_are_rejected() {
        let start = 1_000_000_000;
        let mut session = test_session(start);
        assert_eq!(session.resume(start), Err(SessionError::NotPaused));
        session.pause(start + 1_000).expect("pause");
        assert_eq!(session.pause(start + 2_000), Err(SessionError::NotActive));
    }

    #[test]
    fn counters_start_at_zero_and_only_increment() {
        let mut session = test_session(0);
        for category in CategoryId::ALL {
            assert_eq!(session.category_count(category), 0);
        }
        assert_eq!(session.record_incident(CategoryId::Disruption), 0);
        assert_eq!(session.record_incident(CategoryId::Disruption), 1);
        assert_eq!(session.category_count(CategoryId::Disruption), 2);
        assert_eq!(session.total_incidents(), 2);
    }
}
