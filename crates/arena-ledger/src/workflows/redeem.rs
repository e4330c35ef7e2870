//! Promo-code redemption workflow.

use arena_core::db::unix_timestamp;
use tracing::info;

use super::begin_immediate;
use crate::error::WorkflowError;
use crate::storage::{Database, RedeemCode, TransactionStatus, TransactionType};

impl Database {
    /// Redeem a promo code for a user.
    ///
    /// Credits both balance and bonus_balance by the code amount, records
    /// the redemption, bumps the usage counter, and logs a completed
    /// `redeem_code` transaction in one unit of work. The application-level
    /// already-redeemed check is backstopped by the UNIQUE(user_id,
    /// code_id) constraint, so concurrent duplicate redemptions by the
    /// same user cannot both commit. Returns the amount credited.
    pub async fn redeem(&self, user_id: &str, code: &str) -> Result<i64, WorkflowError> {
        if code.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("code is required".to_string()));
        }

        let mut tx = begin_immediate(self).await?;

        let promo: Option<RedeemCode> = sqlx::query_as("SELECT * FROM redeem_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(promo) = promo else {
            return Err(WorkflowError::NotFound("Redeem code".to_string()));
        };

        if promo.is_active == 0 {
            return Err(WorkflowError::Conflict("Code is inactive".to_string()));
        }
        if promo.expires_at.is_some_and(|exp| unix_timestamp() > exp) {
            return Err(WorkflowError::Conflict("Code expired".to_string()));
        }
        if promo.current_uses >= promo.max_uses {
            return Err(WorkflowError::Conflict("Code limit reached".to_string()));
        }

        let already: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM redeem_history WHERE user_id = ? AND code_id = ?",
        )
        .bind(user_id)
        .bind(&promo.id)
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            return Err(WorkflowError::Conflict(
                "Code already redeemed".to_string(),
            ));
        }

        let updated = sqlx::query(
            "UPDATE wallets SET balance = balance + ?, bonus_balance = bonus_balance + ? \
             WHERE user_id = ?",
        )
        .bind(promo.amount)
        .bind(promo.amount)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(WorkflowError::NotFound("Wallet".to_string()));
        }

        let now = unix_timestamp();

        sqlx::query("INSERT INTO redeem_history (user_id, code_id, redeemed_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(&promo.id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE redeem_codes SET current_uses = current_uses + 1 WHERE id = ?")
            .bind(&promo.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO transactions (user_id, type, amount, status, admin_note, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(TransactionType::RedeemCode.as_str())
        .bind(promo.amount)
        .bind(TransactionStatus::Completed.as_str())
        .bind(format!("Redeemed code: {code}"))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(WorkflowError::from)?;

        info!(user = %user_id, code = %code, amount = promo.amount, "code redeemed");
        Ok(promo.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RedeemCodeParams;
    use crate::workflows::NewAccount;
    use arena_core::config::BonusConfig;

    async fn user(db: &Database, name: &str) -> String {
        let email = format!("{name}@arena.gg");
        db.register_account(
            &NewAccount {
                username: name,
                email: &email,
                password_hash: "hash",
                phone: None,
                invite_code: None,
            },
            &BonusConfig::default(),
        )
        .await
        .unwrap()
        .id
    }

    async fn promo(db: &Database, code: &str, amount: i64, max_uses: i64, expires_at: Option<i64>) {
        db.create_redeem_code(
            &format!("rc-{code}"),
            &RedeemCodeParams {
                code,
                amount,
                max_uses,
                expires_at,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn redeem_credits_wallet_and_logs() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;
        promo(&db, "BONUS50", 50, 10, None).await;

        let credited = db.redeem(&alice, "BONUS50").await.unwrap();
        assert_eq!(credited, 50);

        let wallet = db.get_wallet(&alice).await.unwrap();
        assert_eq!(wallet.balance, 50);
        assert_eq!(wallet.bonus_balance, 50);

        assert_eq!(db.get_redeem_code("BONUS50").await.unwrap().current_uses, 1);

        let txs = db.list_transactions(&alice).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, "redeem_code");
        assert_eq!(txs[0].status, "completed");
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;

        let err = db.redeem(&alice, "NOPE").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn inactive_code_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;
        promo(&db, "OLD", 50, 10, None).await;
        db.deactivate_redeem_code("OLD").await.unwrap();

        let err = db.redeem(&alice, "OLD").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert_eq!(db.get_wallet(&alice).await.unwrap().balance, 0);
    }

    #[tokio::test]
    async fn expired_code_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;
        promo(&db, "EXPIRED", 50, 10, Some(1_000)).await;

        let err = db.redeem(&alice, "EXPIRED").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn usage_limit_is_global() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;
        let bob = user(&db, "bob").await;
        promo(&db, "ONCE", 50, 1, None).await;

        db.redeem(&alice, "ONCE").await.unwrap();
        let err = db.redeem(&bob, "ONCE").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        assert_eq!(db.get_wallet(&bob).await.unwrap().balance, 0);
        assert_eq!(db.get_redeem_code("ONCE").await.unwrap().current_uses, 1);
    }

    #[tokio::test]
    async fn same_user_cannot_redeem_twice() {
        let db = Database::open_in_memory().await.unwrap();
        let alice = user(&db, "alice").await;
        promo(&db, "BONUS50", 50, 10, None).await;

        db.redeem(&alice, "BONUS50").await.unwrap();
        let err = db.redeem(&alice, "BONUS50").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        // Credited exactly once.
        assert_eq!(db.get_wallet(&alice).await.unwrap().balance, 50);
    }

    #[tokio::test]
    async fn concurrent_same_user_redemptions_yield_one_success() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("arena.db")).await.unwrap();
        let alice = user(&db, "alice").await;
        promo(&db, "RACE", 50, 100, None).await;

        let a = {
            let (db, alice) = (db.clone(), alice.clone());
            tokio::spawn(async move { db.redeem(&alice, "RACE").await })
        };
        let b = {
            let (db, alice) = (db.clone(), alice.clone());
            tokio::spawn(async move { db.redeem(&alice, "RACE").await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

        assert_eq!(db.get_wallet(&alice).await.unwrap().balance, 50);
        assert_eq!(db.get_redeem_code("RACE").await.unwrap().current_uses, 1);
    }

    #[tokio::test]
    async fn concurrent_users_respect_max_uses() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("arena.db")).await.unwrap();
        promo(&db, "CAP2", 50, 2, None).await;

        let mut users = Vec::new();
        for i in 0..4 {
            users.push(user(&db, &format!("u{i}")).await);
        }

        let mut handles = Vec::new();
        for u in users.clone() {
            let db = db.clone();
            handles.push(tokio::spawn(async move { db.redeem(&u, "CAP2").await }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 2);
        assert_eq!(db.get_redeem_code("CAP2").await.unwrap().current_uses, 2);
    }
}
