//! Settlement workflows.
//!
//! Each workflow is one business-rule-validated, all-or-nothing unit of
//! work against the ledger: it begins an exclusive transaction, validates
//! invariants, mutates wallets/tournaments/codes consistently, appends to
//! the transaction log, and commits or aborts as a whole. A failed
//! workflow leaves no observable trace.

mod account;
mod payment;
mod redeem;
mod tournament;

pub use account::NewAccount;
pub use payment::PaymentDecision;

use crate::error::WorkflowError;
use crate::storage::Database;

pub(crate) type UnitOfWork = sqlx::Transaction<'static, sqlx::Sqlite>;

/// Begin an exclusive unit of work.
///
/// `BEGIN IMMEDIATE` takes the writer lock up front, so every read inside
/// the workflow observes state no concurrent workflow can still change.
/// This is how the wallet/tournament row locks of the settlement contract
/// map onto `SQLite`; the pool's busy timeout bounds the wait. Dropping
/// the returned transaction on any early-return path rolls it back.
pub(crate) async fn begin_immediate(db: &Database) -> Result<UnitOfWork, WorkflowError> {
    db.pool()
        .begin_with("BEGIN IMMEDIATE")
        .await
        .map_err(WorkflowError::from)
}
