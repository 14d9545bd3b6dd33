use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user account document. `balance_cached` is the spendable counter that
/// debits claim against; it only ever moves inside an atomic claim (or its
/// rollback), so it tracks the entry-log sum exactly while no write is in
/// flight. Read paths still derive balance from the log, which stays the
/// audit ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub balance_cached: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    Purchase,
    AttemptDebit,
    Refund,
    Grant,
}

impl LedgerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Purchase => "purchase",
            LedgerReason::AttemptDebit => "attempt_debit",
            LedgerReason::Refund => "refund",
            LedgerReason::Grant => "grant",
        }
    }
}

/// "Credits purchased" event from the payment processor. The payment id is
/// the idempotency reference, so webhook redeliveries are absorbed.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub amount: i64,
    pub payment_id: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    pub user_id: String,
    pub amount: i64,
    pub reference_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// One immutable balance change. Entries are append-only; a replay with the
/// same `reference_id` returns the stored `balance_after` instead of writing
/// a second entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub account_id: String,
    pub delta: i64,
    pub reason: LedgerReason,
    pub reference_id: String,
    /// Free-text origin detail, e.g. which pool an attempt debit paid for or
    /// whether a refund came from an idle timeout.
    pub description: Option<String>,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}
