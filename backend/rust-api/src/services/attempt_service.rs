use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use super::ledger_service::LedgerService;
use super::refund;
use crate::error::ApiError;
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, ATTEMPTS_TOTAL};
use crate::models::{AbandonOrigin, Attempt, AttemptStatus, LedgerReason, Pool};
use crate::policy::{self, Subject};

/// One credit per attempt, priced at creation and never re-read.
pub const ATTEMPT_COST_CREDITS: i64 = 1;

/// Attempt lifecycle: creation (atomic with the ledger debit), answer
/// submission, completion, and idempotent abandonment with pro-rata refund.
/// All state transitions are conditional storage updates, so concurrent
/// signals serialize on the document and losers observe the winner's state.
pub struct AttemptService {
    mongo: Database,
    redis: ConnectionManager,
}

impl AttemptService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    fn attempts(&self) -> Collection<Attempt> {
        self.mongo.collection("attempts")
    }

    fn pools(&self) -> Collection<Pool> {
        self.mongo.collection("pools")
    }

    fn ledger(&self) -> LedgerService {
        LedgerService::new(self.mongo.clone(), self.redis.clone())
    }

    pub async fn ensure_indexes(mongo: &Database) -> mongodb::error::Result<()> {
        let attempts: Collection<Attempt> = mongo.collection("attempts");
        attempts
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "last_activity_ms": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    /// Debits one credit and creates the attempt in `Created`. The debit's
    /// reference is derived from the attempt id, so a crash between debit
    /// and insert can be replayed without double-charging.
    pub async fn start_attempt(&self, subject: &Subject, pool_id: &str) -> Result<Attempt, ApiError> {
        let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;

        let pool = self
            .pools()
            .find_one(doc! { "_id": pool_id })
            .await?
            .ok_or(ApiError::NotFound)?;
        if !policy::can_view(subject, pool.is_active) {
            return Err(ApiError::NotFound);
        }

        let attempt_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        self.ledger()
            .debit(
                user_id,
                ATTEMPT_COST_CREDITS,
                LedgerReason::AttemptDebit,
                &format!("attempt:{}", attempt_id),
                Some(&format!("attempt on pool {}", pool_id)),
            )
            .await?;

        let attempt = Attempt {
            id: attempt_id,
            user_id: user_id.to_string(),
            pool_id: pool_id.to_string(),
            credits_paid: ATTEMPT_COST_CREDITS,
            questions_submitted: 0,
            total_questions: pool.total_question_count,
            status: AttemptStatus::Created,
            started_at: now,
            ended_at: None,
            last_activity_ms: now.timestamp_millis(),
        };

        self.attempts().insert_one(&attempt).await?;

        ATTEMPTS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            "attempt started: id={}, user={}, pool={}, total_questions={}",
            attempt.id,
            user_id,
            pool_id,
            attempt.total_questions
        );

        Ok(attempt)
    }

    /// Owner or admin only; everyone else gets the generic denial.
    pub async fn get_attempt(&self, subject: &Subject, attempt_id: &str) -> Result<Attempt, ApiError> {
        let attempt = self
            .attempts()
            .find_one(doc! { "_id": attempt_id })
            .await?
            .ok_or(ApiError::NotFound)?;

        if !subject.is_admin() && subject.user_id() != Some(attempt.user_id.as_str()) {
            return Err(ApiError::NotFound);
        }
        Ok(attempt)
    }

    /// Accounts for exactly one question. The status guard, the bounds check
    /// and the increment live in one conditional update, so two concurrent
    /// submissions cannot both count the same slot and no increment is lost.
    pub async fn submit_answer(
        &self,
        subject: &Subject,
        attempt_id: &str,
        question_ref: &str,
    ) -> Result<Attempt, ApiError> {
        let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;
        let now_ms = Utc::now().timestamp_millis();

        let updated = self
            .attempts()
            .find_one_and_update(
                doc! {
                    "_id": attempt_id,
                    "user_id": user_id,
                    "status": { "$in": ["created", "in_progress"] },
                    "$expr": { "$lt": ["$questions_submitted", "$total_questions"] },
                },
                doc! {
                    "$inc": { "questions_submitted": 1i64 },
                    "$set": { "status": "in_progress", "last_activity_ms": now_ms },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        match updated {
            Some(attempt) => {
                ANSWERS_SUBMITTED_TOTAL.with_label_values(&["accepted"]).inc();
                tracing::info!(
                    "answer submitted: attempt={}, question={}, progress={}/{}",
                    attempt_id,
                    question_ref,
                    attempt.questions_submitted,
                    attempt.total_questions
                );
                Ok(attempt)
            }
            None => {
                ANSWERS_SUBMITTED_TOTAL.with_label_values(&["rejected"]).inc();
                Err(self.diagnose_submit_failure(user_id, attempt_id).await?)
            }
        }
    }

    /// The conditional update matched nothing; re-read to tell the caller
    /// which guard rejected it.
    async fn diagnose_submit_failure(
        &self,
        user_id: &str,
        attempt_id: &str,
    ) -> Result<ApiError, ApiError> {
        let attempt = self
            .attempts()
            .find_one(doc! { "_id": attempt_id })
            .await?;

        let attempt = match attempt {
            Some(a) if a.user_id == user_id => a,
            _ => return Ok(ApiError::NotFound),
        };

        if !attempt.status.accepts_submissions() {
            return Ok(ApiError::InvalidTransition(
                "attempt is no longer accepting submissions",
            ));
        }
        Ok(ApiError::OutOfRange("all questions already submitted"))
    }

    /// Finalizes a fully submitted attempt; no refund. Terminal attempts are
    /// a no-op success so a duplicate signal (or losing the race against an
    /// abandonment) is not an error.
    pub async fn complete_attempt(
        &self,
        subject: &Subject,
        attempt_id: &str,
    ) -> Result<Attempt, ApiError> {
        let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;
        let now = Utc::now();

        let updated = self
            .attempts()
            .find_one_and_update(
                doc! {
                    "_id": attempt_id,
                    "user_id": user_id,
                    "status": { "$in": ["created", "in_progress"] },
                    "$expr": { "$eq": ["$questions_submitted", "$total_questions"] },
                },
                doc! { "$set": {
                    "status": "closed",
                    "ended_at": now.to_rfc3339(),
                } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        if let Some(attempt) = updated {
            ATTEMPTS_TOTAL.with_label_values(&["closed"]).inc();
            tracing::info!("attempt completed: id={}, user={}", attempt_id, user_id);
            return Ok(attempt);
        }

        let attempt = self
            .attempts()
            .find_one(doc! { "_id": attempt_id })
            .await?;
        let attempt = match attempt {
            Some(a) if a.user_id == user_id => a,
            _ => return Err(ApiError::NotFound),
        };

        if attempt.status.accepts_submissions() {
            return Err(ApiError::InvalidTransition(
                "attempt is not fully submitted",
            ));
        }
        // Already terminal (or mid-abandonment): whoever committed first won.
        Ok(attempt)
    }

    /// User-facing abandonment; scoped to the attempt owner unless the
    /// caller is an admin.
    pub async fn abandon_attempt(
        &self,
        subject: &Subject,
        attempt_id: &str,
        origin: AbandonOrigin,
    ) -> Result<Attempt, ApiError> {
        let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;
        let owner = if subject.is_admin() {
            None
        } else {
            Some(user_id)
        };
        self.do_abandon(attempt_id, owner, origin).await
    }

    /// Entry point for the idle timeout collaborator; same transition, no
    /// ownership scoping.
    pub async fn abandon_internal(
        &self,
        attempt_id: &str,
        origin: AbandonOrigin,
    ) -> Result<Attempt, ApiError> {
        self.do_abandon(attempt_id, None, origin).await
    }

    /// Idempotent. Claims `Abandoned`, credits the pro-rata refund (at most
    /// once: the refund reference is derived from the attempt id), then
    /// finalizes as `RefundIssued`. A fully submitted attempt that missed
    /// its completion signal is finalized as `Closed` instead, with no
    /// refund entry. Duplicate signals against a terminal attempt return it
    /// unchanged; a crash between claim and finalize is healed by the next
    /// invocation resuming from the `Abandoned` claim.
    async fn do_abandon(
        &self,
        attempt_id: &str,
        owner: Option<&str>,
        origin: AbandonOrigin,
    ) -> Result<Attempt, ApiError> {
        let mut claim_filter = doc! {
            "_id": attempt_id,
            "status": { "$in": ["created", "in_progress"] },
        };
        if let Some(user_id) = owner {
            claim_filter.insert("user_id", user_id);
        }

        let claimed = self
            .attempts()
            .find_one_and_update(claim_filter, doc! { "$set": { "status": "abandoned" } })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        let attempt = match claimed {
            Some(a) => a,
            None => {
                let existing = self
                    .attempts()
                    .find_one(doc! { "_id": attempt_id })
                    .await?;
                let existing = match existing {
                    Some(a) if owner.is_none() || owner == Some(a.user_id.as_str()) => a,
                    _ => return Err(ApiError::NotFound),
                };
                match existing.status {
                    // Crash recovery: a previous abandonment claimed the
                    // attempt but never finished issuing the refund.
                    AttemptStatus::Abandoned => existing,
                    // Terminal, or a completion that won the race: no-op.
                    _ => return Ok(existing),
                }
            }
        };

        // Every question was delivered, so there is nothing to refund; the
        // user (or the timeout sweep) just never sent the completion signal.
        if attempt.total_questions > 0 && attempt.questions_submitted >= attempt.total_questions {
            let closed = self
                .attempts()
                .find_one_and_update(
                    doc! { "_id": attempt_id, "status": "abandoned" },
                    doc! { "$set": {
                        "status": "closed",
                        "ended_at": Utc::now().to_rfc3339(),
                    } },
                )
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .await?;

            let attempt = match closed {
                Some(a) => {
                    ATTEMPTS_TOTAL.with_label_values(&["closed"]).inc();
                    a
                }
                None => self
                    .attempts()
                    .find_one(doc! { "_id": attempt_id })
                    .await?
                    .ok_or(ApiError::NotFound)?,
            };
            tracing::info!(
                "fully submitted attempt closed on abandon signal: id={}",
                attempt_id
            );
            return Ok(attempt);
        }

        let refund_amount = refund::refund(
            attempt.credits_paid,
            attempt.questions_submitted,
            attempt.total_questions,
        );

        // A zero refund still writes its entry: the audit trail records the
        // abandonment either way, and replays stay uniform.
        self.ledger()
            .credit(
                &attempt.user_id,
                refund_amount,
                LedgerReason::Refund,
                &format!("refund:{}", attempt_id),
                Some(origin.description()),
            )
            .await?;

        let finalized = self
            .attempts()
            .find_one_and_update(
                doc! { "_id": attempt_id, "status": "abandoned" },
                doc! { "$set": {
                    "status": "refund_issued",
                    "ended_at": Utc::now().to_rfc3339(),
                } },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;

        let attempt = match finalized {
            Some(a) => {
                ATTEMPTS_TOTAL.with_label_values(&["refund_issued"]).inc();
                a
            }
            // Another finalizer got there first; return its result.
            None => self
                .attempts()
                .find_one(doc! { "_id": attempt_id })
                .await?
                .ok_or(ApiError::NotFound)?,
        };

        tracing::info!(
            "attempt abandoned: id={}, origin={:?}, refund={}",
            attempt_id,
            origin,
            refund_amount
        );

        Ok(attempt)
    }

    /// Non-terminal attempts with no activity since `cutoff_ms`, for the
    /// timeout worker.
    pub async fn find_stale(&self, cutoff_ms: i64, limit: i64) -> Result<Vec<Attempt>, ApiError> {
        let cursor = self
            .attempts()
            .find(doc! {
                "status": { "$in": ["created", "in_progress"] },
                "last_activity_ms": { "$lt": cutoff_ms },
            })
            .limit(limit)
            .await?;
        let stale: Vec<Attempt> = cursor.try_collect().await?;
        Ok(stale)
    }
}
