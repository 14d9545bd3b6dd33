use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument, UpdateOptions};
use mongodb::{Collection, Database, IndexModel};
use redis::aio::ConnectionManager;
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics::{
    record_balance_cache_hit, record_balance_cache_miss, LEDGER_ENTRIES_TOTAL,
    LEDGER_REPLAYS_TOTAL,
};
use crate::models::{Account, LedgerEntry, LedgerReason};
use crate::utils::retry::{retry_on, RetryConfig};

const BALANCE_CACHE_TTL_SECS: u64 = 300;

/// Append-only credit ledger. The entry log is ground truth for reads and
/// audits; admission control for writes lives on the account document, whose
/// spendable counter is checked and moved in one atomic update so two debits
/// can never both spend the same credit.
pub struct LedgerService {
    mongo: Database,
    redis: ConnectionManager,
}

impl LedgerService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    fn entries(&self) -> Collection<LedgerEntry> {
        self.mongo.collection("ledger_entries")
    }

    fn accounts(&self) -> Collection<Account> {
        self.mongo.collection("accounts")
    }

    pub async fn ensure_indexes(mongo: &Database) -> mongodb::error::Result<()> {
        let entries: Collection<LedgerEntry> = mongo.collection("ledger_entries");
        entries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "account_id": 1, "reference_id": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        Ok(())
    }

    /// Sum of all entry deltas for the account. Never served from the
    /// account counter; the counter and the Redis cache are both reconciled
    /// against this.
    pub async fn balance(&self, account_id: &str) -> Result<i64, ApiError> {
        let pipeline = vec![
            doc! { "$match": { "account_id": account_id } },
            doc! { "$group": { "_id": null, "total": { "$sum": "$delta" } } },
        ];

        let mut cursor = self.entries().aggregate(pipeline).await?;
        if let Some(row) = cursor.try_next().await? {
            let total = row
                .get_i64("total")
                .or_else(|_| row.get_i32("total").map(i64::from))
                .unwrap_or(0);
            return Ok(total);
        }
        Ok(0)
    }

    /// Balance for read paths, via the Redis read-through cache. The debit
    /// path never consults this.
    pub async fn cached_balance(&self, account_id: &str) -> Result<i64, ApiError> {
        let mut conn = self.redis.clone();
        let cache_key = balance_cache_key(account_id);

        let cached: Option<i64> = redis::cmd("GET")
            .arg(&cache_key)
            .query_async(&mut conn)
            .await
            .unwrap_or(None);

        if let Some(balance) = cached {
            record_balance_cache_hit();
            return Ok(balance);
        }
        record_balance_cache_miss();

        let balance = self.balance(account_id).await?;
        let _: Result<(), _> = redis::cmd("SETEX")
            .arg(&cache_key)
            .arg(BALANCE_CACHE_TTL_SECS)
            .arg(balance)
            .query_async(&mut conn)
            .await;

        Ok(balance)
    }

    /// Appends a `-amount` entry if the balance covers it. Idempotent on
    /// `reference_id`: replays return the original entry's resulting balance
    /// without re-applying.
    pub async fn debit(
        &self,
        account_id: &str,
        amount: i64,
        reason: LedgerReason,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<i64, ApiError> {
        if amount < 0 {
            return Err(ApiError::OutOfRange("debit amount must be non-negative"));
        }
        retry_on(RetryConfig::default(), ApiError::is_conflict, || async {
            self.try_apply(account_id, -amount, reason, reference_id, description)
                .await
        })
        .await
    }

    /// Appends a `+amount` entry; same idempotency rule as `debit`.
    pub async fn credit(
        &self,
        account_id: &str,
        amount: i64,
        reason: LedgerReason,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<i64, ApiError> {
        if amount < 0 {
            return Err(ApiError::OutOfRange("credit amount must be non-negative"));
        }
        retry_on(RetryConfig::default(), ApiError::is_conflict, || async {
            self.try_apply(account_id, amount, reason, reference_id, description)
                .await
        })
        .await
    }

    /// One pass: replay check, atomic funds claim, entry append. The claim
    /// both verifies and reserves the amount in a single conditional update,
    /// so there is no window in which two writers observe the same spendable
    /// balance; a failed append rolls the reservation back.
    async fn try_apply(
        &self,
        account_id: &str,
        delta: i64,
        reason: LedgerReason,
        reference_id: &str,
        description: Option<&str>,
    ) -> Result<i64, ApiError> {
        if let Some(existing) = self.find_entry(account_id, reference_id).await? {
            LEDGER_REPLAYS_TOTAL
                .with_label_values(&[reason.as_str()])
                .inc();
            tracing::info!(
                "ledger replay absorbed: account={}, reference={}",
                account_id,
                reference_id
            );
            return Ok(existing.balance_after);
        }

        self.ensure_account(account_id).await?;

        let account = match self.claim_funds(account_id, delta).await? {
            Some(account) => account,
            None => {
                // A replay can race its own original past the pre-check;
                // look again before judging the balance.
                if let Some(existing) = self.find_entry(account_id, reference_id).await? {
                    LEDGER_REPLAYS_TOTAL
                        .with_label_values(&[reason.as_str()])
                        .inc();
                    return Ok(existing.balance_after);
                }
                return Err(self.diagnose_claim_failure(account_id, delta).await?);
            }
        };

        self.append_entry(
            account_id,
            delta,
            reason,
            reference_id,
            description,
            account.balance_cached,
        )
        .await
    }

    async fn find_entry(
        &self,
        account_id: &str,
        reference_id: &str,
    ) -> Result<Option<LedgerEntry>, ApiError> {
        let entry = self
            .entries()
            .find_one(doc! { "account_id": account_id, "reference_id": reference_id })
            .await?;
        Ok(entry)
    }

    /// Creates the account document on first touch.
    async fn ensure_account(&self, account_id: &str) -> Result<(), ApiError> {
        self.accounts()
            .update_one(
                doc! { "_id": account_id },
                doc! { "$setOnInsert": {
                    "balance_cached": 0i64,
                    "updated_at": Utc::now().to_rfc3339(),
                } },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;
        Ok(())
    }

    /// Atomically reserves `delta` on the account counter. For a debit the
    /// filter requires the counter to cover the amount, making the funds
    /// check and the reservation one storage operation.
    async fn claim_funds(
        &self,
        account_id: &str,
        delta: i64,
    ) -> Result<Option<Account>, ApiError> {
        let mut filter = doc! { "_id": account_id };
        if delta < 0 {
            filter.insert("balance_cached", doc! { "$gte": -delta });
        }

        let account = self
            .accounts()
            .find_one_and_update(
                filter,
                doc! {
                    "$inc": { "balance_cached": delta },
                    "$set": { "updated_at": Utc::now().to_rfc3339() },
                },
            )
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await?;
        Ok(account)
    }

    /// The claim matched nothing. Usually the balance is simply too low; if
    /// the entry log disagrees, the counter is trailing an in-flight append
    /// and the operation retries as a whole.
    async fn diagnose_claim_failure(
        &self,
        account_id: &str,
        delta: i64,
    ) -> Result<ApiError, ApiError> {
        let log_balance = self.balance(account_id).await?;
        if log_balance + delta < 0 {
            return Ok(ApiError::InsufficientFunds);
        }
        tracing::warn!(
            "balance counter behind entry log: account={}, log_balance={}",
            account_id,
            log_balance
        );
        Ok(ApiError::Conflict("balance counter behind entry log"))
    }

    async fn append_entry(
        &self,
        account_id: &str,
        delta: i64,
        reason: LedgerReason,
        reference_id: &str,
        description: Option<&str>,
        balance_after: i64,
    ) -> Result<i64, ApiError> {
        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            delta,
            reason,
            reference_id: reference_id.to_string(),
            description: description.map(|s| s.to_string()),
            balance_after,
            created_at: Utc::now(),
        };

        match self.entries().insert_one(&entry).await {
            Ok(_) => {}
            // Unique-index backstop: a concurrent writer landed the same
            // reference first. Release our reservation; their result is the
            // result.
            Err(e) if is_duplicate_key(&e) => {
                self.release_claim(account_id, delta).await;
                LEDGER_REPLAYS_TOTAL
                    .with_label_values(&[reason.as_str()])
                    .inc();
                let existing = self
                    .find_entry(account_id, reference_id)
                    .await?
                    .ok_or_else(|| ApiError::Conflict("duplicate entry vanished"))?;
                return Ok(existing.balance_after);
            }
            Err(e) => {
                self.release_claim(account_id, delta).await;
                return Err(e.into());
            }
        }

        LEDGER_ENTRIES_TOTAL
            .with_label_values(&[reason.as_str()])
            .inc();

        tracing::info!(
            "ledger entry appended: account={}, delta={}, reason={}, reference={}, balance_after={}",
            account_id,
            delta,
            reason.as_str(),
            reference_id,
            balance_after
        );

        self.invalidate_cache(account_id).await;

        Ok(balance_after)
    }

    /// Rolls a reservation back when its entry append did not commit, so the
    /// counter keeps tracking the log.
    async fn release_claim(&self, account_id: &str, delta: i64) {
        let undo = self
            .accounts()
            .update_one(
                doc! { "_id": account_id },
                doc! {
                    "$inc": { "balance_cached": -delta },
                    "$set": { "updated_at": Utc::now().to_rfc3339() },
                },
            )
            .await;
        if let Err(e) = undo {
            tracing::error!(
                "failed to release claimed balance: account={}, delta={}, err={:#}",
                account_id,
                delta,
                e
            );
        }
    }

    /// Best effort: the Redis mirror is a convenience, and a failure here
    /// must not fail a committed ledger write.
    async fn invalidate_cache(&self, account_id: &str) {
        let mut conn = self.redis.clone();
        let del: Result<(), _> = redis::cmd("DEL")
            .arg(balance_cache_key(account_id))
            .query_async(&mut conn)
            .await;
        if let Err(e) = del {
            tracing::warn!("failed to invalidate balance cache: {:#}", e);
        }
    }
}

fn balance_cache_key(account_id: &str) -> String {
    format!("balance:{}", account_id)
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
        *e.kind
    {
        return we.code == 11000;
    }
    false
}
