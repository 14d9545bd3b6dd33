use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database};
use uuid::Uuid;

use super::pool_service::PoolService;
use crate::error::ApiError;
use crate::metrics::REPORTS_TOTAL;
use crate::models::{Report, ReportStatus};
use crate::policy::{self, Subject};

/// "This question is broken" reports and their admin review workflow.
pub struct ReportService {
    mongo: Database,
}

impl ReportService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn reports(&self) -> Collection<Report> {
        self.mongo.collection("reports")
    }

    /// A user may only file under their own id, and only against a question
    /// they can see.
    pub async fn file_report(
        &self,
        subject: &Subject,
        question_id: &str,
        reason: &str,
    ) -> Result<Report, ApiError> {
        let reporter_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;

        let pool_service = PoolService::new(self.mongo.clone());
        let question = pool_service.get_visible_question(subject, question_id).await?;

        let report = Report {
            id: Uuid::new_v4().to_string(),
            question_id: question.id,
            reporter_id: Some(reporter_id.to_string()),
            reason: reason.to_string(),
            status: ReportStatus::Pending,
            admin_notes: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };

        self.reports().insert_one(&report).await?;

        REPORTS_TOTAL.with_label_values(&["pending"]).inc();
        tracing::info!(
            "report filed: id={}, question={}, reporter={}",
            report.id,
            report.question_id,
            reporter_id
        );

        Ok(report)
    }

    pub async fn get_report(&self, subject: &Subject, report_id: &str) -> Result<Report, ApiError> {
        let report = self
            .reports()
            .find_one(doc! { "_id": report_id })
            .await?
            .ok_or(ApiError::NotFound)?;

        if !policy::can_view_report(subject, report.reporter_id.as_deref()) {
            return Err(ApiError::NotFound);
        }
        Ok(report)
    }

    pub async fn list_reports(
        &self,
        subject: &Subject,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>, ApiError> {
        if !policy::can_review_reports(subject) {
            return Err(ApiError::NotAuthorized);
        }

        let filter = match status {
            Some(s) => doc! { "status": s.as_str() },
            None => doc! {},
        };
        let cursor = self.reports().find(filter).await?;
        let reports: Vec<Report> = cursor.try_collect().await?;
        Ok(reports)
    }

    /// Advances the workflow one legal step. The current status sits in the
    /// update filter, so two concurrent reviews cannot both apply; the loser
    /// sees `InvalidTransition`.
    pub async fn review_report(
        &self,
        subject: &Subject,
        report_id: &str,
        new_status: ReportStatus,
        notes: Option<&str>,
    ) -> Result<Report, ApiError> {
        if !policy::can_review_reports(subject) {
            return Err(ApiError::NotAuthorized);
        }
        let reviewer = subject.user_id().ok_or(ApiError::NotAuthorized)?;

        let report = self
            .reports()
            .find_one(doc! { "_id": report_id })
            .await?
            .ok_or(ApiError::NotFound)?;

        if !ReportStatus::can_transition(report.status, new_status) {
            return Err(ApiError::InvalidTransition(
                "report status may only advance pending -> reviewed -> {resolved, dismissed}",
            ));
        }

        let mut set = doc! {
            "status": new_status.as_str(),
            "reviewed_by": reviewer,
            "reviewed_at": Utc::now().to_rfc3339(),
        };
        if let Some(notes) = notes {
            set.insert("admin_notes", notes);
        }

        let updated = self
            .reports()
            .find_one_and_update(
                doc! { "_id": report_id, "status": report.status.as_str() },
                doc! { "$set": set },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?
            .ok_or(ApiError::InvalidTransition(
                "report was reviewed concurrently",
            ))?;

        REPORTS_TOTAL
            .with_label_values(&[new_status.as_str()])
            .inc();
        tracing::info!(
            "report reviewed: id={}, status={}, by={}",
            report_id,
            new_status.as_str(),
            reviewer
        );

        Ok(updated)
    }
}
