//! Deposit and withdrawal settlement workflows.
//!
//! Deposits are credited only on admin approval. Withdrawals use
//! hold-by-debit: the wallet is debited at request time, so approval only
//! updates the lifetime stats and rejection must refund the held amount.

use arena_core::config::BonusConfig;
use arena_core::db::unix_timestamp;
use tracing::info;

use super::begin_immediate;
use crate::error::WorkflowError;
use crate::storage::{Database, Transaction, TransactionStatus, TransactionType};

/// Admin decision on a pending payment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Approved,
    Rejected,
}

impl PaymentDecision {
    /// Terminal transaction status this decision resolves to.
    pub const fn resolved_status(self) -> TransactionStatus {
        match self {
            Self::Approved => TransactionStatus::Completed,
            Self::Rejected => TransactionStatus::Rejected,
        }
    }
}

impl Database {
    /// File a deposit request: a pending `deposit` transaction carrying
    /// the payment proof reference. No balance changes until approval.
    pub async fn request_deposit(
        &self,
        user_id: &str,
        amount: i64,
        payment_method: &str,
        payment_proof: &str,
        manual_reference: Option<&str>,
    ) -> Result<Transaction, WorkflowError> {
        if amount <= 0 {
            return Err(WorkflowError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }
        if payment_proof.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "payment proof is required".to_string(),
            ));
        }

        // Wallet existence doubles as the user check.
        self.get_wallet(user_id).await?;

        let now = unix_timestamp();
        let result = sqlx::query(
            "INSERT INTO transactions (user_id, type, amount, status, payment_method, \
             payment_proof, manual_reference, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(TransactionType::Deposit.as_str())
        .bind(amount)
        .bind(TransactionStatus::Pending.as_str())
        .bind(payment_method)
        .bind(payment_proof)
        .bind(manual_reference)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        info!(user = %user_id, amount, "deposit requested");
        self.get_transaction(result.last_insert_rowid())
            .await
            .map_err(Into::into)
    }

    /// File a withdrawal request. The amount is debited immediately
    /// (hold-by-debit) and a pending `withdrawal` transaction records the
    /// payout destination; both happen in one unit of work.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        amount: i64,
        payment_method: &str,
        account_details: &str,
    ) -> Result<Transaction, WorkflowError> {
        if amount <= 0 {
            return Err(WorkflowError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }

        let mut tx = begin_immediate(self).await?;

        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(balance) = balance else {
            return Err(WorkflowError::NotFound("Wallet".to_string()));
        };
        if balance < amount {
            return Err(WorkflowError::InsufficientFunds);
        }

        sqlx::query("UPDATE wallets SET balance = balance - ? WHERE user_id = ?")
            .bind(amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let now = unix_timestamp();
        let result = sqlx::query(
            "INSERT INTO transactions (user_id, type, amount, status, payment_method, \
             admin_note, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(TransactionType::Withdrawal.as_str())
        .bind(amount)
        .bind(TransactionStatus::Pending.as_str())
        .bind(payment_method)
        .bind(account_details)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        tx.commit().await.map_err(WorkflowError::from)?;

        info!(user = %user_id, amount, "withdrawal requested, funds held");
        self.get_transaction(id).await.map_err(Into::into)
    }

    /// Settle a pending payment request.
    ///
    /// The pending-status check is the single idempotency guard: a request
    /// settles exactly once, and everything below happens in its unit of
    /// work. An approved first deposit also pays the referrer's bonus.
    pub async fn process_payment(
        &self,
        transaction_id: i64,
        decision: PaymentDecision,
        note: Option<&str>,
        bonus: &BonusConfig,
    ) -> Result<Transaction, WorkflowError> {
        let mut tx = begin_immediate(self).await?;

        let payment: Option<Transaction> = sqlx::query_as("SELECT * FROM transactions WHERE id = ?")
            .bind(transaction_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(payment) = payment else {
            return Err(WorkflowError::NotFound("Transaction".to_string()));
        };
        if payment.status != TransactionStatus::Pending.as_str() {
            return Err(WorkflowError::Conflict(
                "Transaction already processed".to_string(),
            ));
        }

        let is_deposit = payment.tx_type == TransactionType::Deposit.as_str();
        let is_withdrawal = payment.tx_type == TransactionType::Withdrawal.as_str();
        if !is_deposit && !is_withdrawal {
            return Err(WorkflowError::Conflict(
                "Transaction is not a payment request".to_string(),
            ));
        }

        match (decision, is_deposit) {
            (PaymentDecision::Approved, true) => {
                sqlx::query(
                    "UPDATE wallets SET balance = balance + ?, \
                     total_deposited = total_deposited + ? WHERE user_id = ?",
                )
                .bind(payment.amount)
                .bind(payment.amount)
                .bind(&payment.user_id)
                .execute(&mut *tx)
                .await?;

                self.settle_referral_bonus(&mut tx, &payment, bonus).await?;
            }
            (PaymentDecision::Approved, false) => {
                // Funds were already held at request time.
                sqlx::query(
                    "UPDATE wallets SET total_withdrawn = total_withdrawn + ? WHERE user_id = ?",
                )
                .bind(payment.amount)
                .bind(&payment.user_id)
                .execute(&mut *tx)
                .await?;
            }
            (PaymentDecision::Rejected, false) => {
                // Release the hold back to the wallet.
                sqlx::query("UPDATE wallets SET balance = balance + ? WHERE user_id = ?")
                    .bind(payment.amount)
                    .bind(&payment.user_id)
                    .execute(&mut *tx)
                    .await?;
            }
            (PaymentDecision::Rejected, true) => {
                // Never credited, nothing to reverse.
            }
        }

        sqlx::query(
            "UPDATE transactions SET status = ?, admin_note = COALESCE(?, admin_note), \
             updated_at = ? WHERE id = ?",
        )
        .bind(decision.resolved_status().as_str())
        .bind(note)
        .bind(unix_timestamp())
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(WorkflowError::from)?;

        info!(
            transaction = transaction_id,
            user = %payment.user_id,
            amount = payment.amount,
            decision = ?decision,
            "payment processed"
        );
        self.get_transaction(transaction_id).await.map_err(Into::into)
    }

    /// Credit the referrer's bonus if this approval settles the user's
    /// first deposit.
    ///
    /// First-deposit detection compares the post-credit `total_deposited`
    /// to the approved amount; with integer minor units the comparison is
    /// exact.
    async fn settle_referral_bonus(
        &self,
        tx: &mut super::UnitOfWork,
        payment: &Transaction,
        bonus: &BonusConfig,
    ) -> Result<(), WorkflowError> {
        let total_deposited: i64 =
            sqlx::query_scalar("SELECT total_deposited FROM wallets WHERE user_id = ?")
                .bind(&payment.user_id)
                .fetch_one(&mut **tx)
                .await?;
        if total_deposited != payment.amount {
            return Ok(());
        }

        let referrer: Option<String> =
            sqlx::query_scalar("SELECT referred_by FROM users WHERE id = ?")
                .bind(&payment.user_id)
                .fetch_optional(&mut **tx)
                .await?
                .flatten();
        let Some(referrer) = referrer else {
            return Ok(());
        };

        let bonus_amount = payment.amount * bonus.referral_bonus_percent / 100;
        if bonus_amount <= 0 {
            return Ok(());
        }

        sqlx::query(
            "UPDATE wallets SET balance = balance + ?, bonus_balance = bonus_balance + ? \
             WHERE user_id = ?",
        )
        .bind(bonus_amount)
        .bind(bonus_amount)
        .bind(&referrer)
        .execute(&mut **tx)
        .await?;

        let now = unix_timestamp();
        sqlx::query(
            "INSERT INTO transactions (user_id, type, amount, status, admin_note, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&referrer)
        .bind(TransactionType::ReferralBonus.as_str())
        .bind(bonus_amount)
        .bind(TransactionStatus::Completed.as_str())
        .bind(format!("Bonus for referring user {}", payment.user_id))
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        info!(referrer = %referrer, amount = bonus_amount, "referral bonus credited");
        Ok(())
    }
}
