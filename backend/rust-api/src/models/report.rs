use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Reviewed => "reviewed",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
        }
    }

    /// Status only advances: pending -> reviewed -> {resolved, dismissed}.
    pub fn can_transition(from: ReportStatus, to: ReportStatus) -> bool {
        matches!(
            (from, to),
            (ReportStatus::Pending, ReportStatus::Reviewed)
                | (ReportStatus::Reviewed, ReportStatus::Resolved)
                | (ReportStatus::Reviewed, ReportStatus::Dismissed)
        )
    }
}

/// A user-filed "this question is broken" flag, reviewed by admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_id: String,
    /// None once the reporting account has been removed.
    pub reporter_id: Option<String>,
    pub reason: String,
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FileReportRequest {
    pub question_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewReportRequest {
    pub status: ReportStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub status: Option<ReportStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_only() {
        use ReportStatus::*;
        assert!(ReportStatus::can_transition(Pending, Reviewed));
        assert!(ReportStatus::can_transition(Reviewed, Resolved));
        assert!(ReportStatus::can_transition(Reviewed, Dismissed));

        // No skipping ahead, no moving backwards, no leaving terminal states.
        assert!(!ReportStatus::can_transition(Pending, Resolved));
        assert!(!ReportStatus::can_transition(Pending, Dismissed));
        assert!(!ReportStatus::can_transition(Reviewed, Pending));
        assert!(!ReportStatus::can_transition(Resolved, Dismissed));
        assert!(!ReportStatus::can_transition(Dismissed, Reviewed));
        assert!(!ReportStatus::can_transition(Resolved, Pending));
    }
}
