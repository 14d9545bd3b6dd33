pub mod account;
pub mod attempt;
pub mod pool;
pub mod report;

pub use account::{Account, LedgerEntry, LedgerReason};
pub use attempt::{AbandonOrigin, Attempt, AttemptStatus, StartAttemptRequest, SubmitAnswerRequest};
pub use pool::{Pool, Question};
pub use report::{Report, ReportStatus};
