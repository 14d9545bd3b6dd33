use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Created,
    InProgress,
    Completed,
    Abandoned,
    Closed,
    RefundIssued,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Created => "created",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
            AttemptStatus::Closed => "closed",
            AttemptStatus::RefundIssued => "refund_issued",
        }
    }

    /// Terminal states accept no further transitions; duplicate completion
    /// or abandonment signals against them are no-op successes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptStatus::Closed | AttemptStatus::RefundIssued)
    }

    /// Only these states accept answer submissions (and the transitions to
    /// `Completed`/`Abandoned` that follow from them).
    pub fn accepts_submissions(&self) -> bool {
        matches!(self, AttemptStatus::Created | AttemptStatus::InProgress)
    }
}

/// Distinguishes who pulled the plug on an attempt. Both origins take the
/// same transition and ledger reason; the detail lands in the refund entry's
/// description so audits can tell them apart later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonOrigin {
    User,
    IdleTimeout,
}

impl AbandonOrigin {
    pub fn description(&self) -> &'static str {
        match self {
            AbandonOrigin::User => "abandoned by user",
            AbandonOrigin::IdleTimeout => "abandoned by idle timeout",
        }
    }
}

/// One user's run through a pool. `credits_paid` and `total_questions` are
/// snapshots taken at creation and never re-read from the pool afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub pool_id: String,
    pub credits_paid: i64,
    pub questions_submitted: i64,
    pub total_questions: i64,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Epoch millis of the last submission (or creation), used by the idle
    /// timeout worker's staleness query.
    pub last_activity_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartAttemptRequest {
    pub pool_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(AttemptStatus::Closed.is_terminal());
        assert!(AttemptStatus::RefundIssued.is_terminal());
        assert!(!AttemptStatus::Created.is_terminal());
        assert!(!AttemptStatus::InProgress.is_terminal());
        assert!(!AttemptStatus::Abandoned.is_terminal());
        assert!(!AttemptStatus::Completed.is_terminal());
    }

    #[test]
    fn only_created_and_in_progress_accept_submissions() {
        assert!(AttemptStatus::Created.accepts_submissions());
        assert!(AttemptStatus::InProgress.accepts_submissions());
        for s in [
            AttemptStatus::Completed,
            AttemptStatus::Abandoned,
            AttemptStatus::Closed,
            AttemptStatus::RefundIssued,
        ] {
            assert!(!s.accepts_submissions());
        }
    }

    #[test]
    fn status_round_trips_through_serde() {
        let json = serde_json::to_string(&AttemptStatus::RefundIssued).unwrap();
        assert_eq!(json, "\"refund_issued\"");
        let back: AttemptStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttemptStatus::RefundIssued);
    }
}
