//! Account registration workflow.
//!
//! Creates the user, their wallet, and the optional signup bonus in one
//! unit of work, so no user ever exists without a wallet and no bonus is
//! ever credited without its matching user row.

use arena_core::config::BonusConfig;
use arena_core::db::unix_timestamp;
use rand::RngExt;
use tracing::info;
use uuid::Uuid;

use super::begin_immediate;
use crate::error::WorkflowError;
use crate::storage::{Database, TransactionStatus, TransactionType, User};

/// Parameters for a new account. The password is already hashed by the
/// credential collaborator at the boundary.
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    /// Referral code of the inviting user, if any.
    pub invite_code: Option<&'a str>,
}

/// Characters used for generated referral codes. Excludes 0/O/1/I to keep
/// codes unambiguous when shared verbally.
const REFERRAL_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn generate_referral_code() -> String {
    let mut rng = rand::rng();
    (0..8)
        .map(|_| REFERRAL_CHARS[rng.random_range(0..REFERRAL_CHARS.len())] as char)
        .collect()
}

impl Database {
    /// Register a new account: user row, zeroed wallet, and signup bonus
    /// (when configured) in a single unit of work.
    pub async fn register_account(
        &self,
        account: &NewAccount<'_>,
        bonus: &BonusConfig,
    ) -> Result<User, WorkflowError> {
        if account.username.trim().is_empty() || account.email.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "username and email are required".to_string(),
            ));
        }
        if account.password_hash.is_empty() {
            return Err(WorkflowError::InvalidInput("password is required".to_string()));
        }

        let mut tx = begin_immediate(self).await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? OR username = ?")
                .bind(account.email)
                .bind(account.username)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(WorkflowError::Conflict("Account already exists".to_string()));
        }

        // An unknown invite code is ignored rather than rejected; the
        // account is simply created without a referrer.
        let referred_by: Option<String> = match account.invite_code {
            Some(code) if !code.is_empty() => {
                sqlx::query_scalar("SELECT id FROM users WHERE referral_code = ?")
                    .bind(code)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            _ => None,
        };

        let id = Uuid::new_v4().to_string();
        let referral_code = generate_referral_code();
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, phone, referral_code, \
             referred_by, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(account.username)
        .bind(account.email)
        .bind(account.password_hash)
        .bind(account.phone)
        .bind(&referral_code)
        .bind(&referred_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO wallets (user_id) VALUES (?)")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        if bonus.signup_bonus > 0 {
            sqlx::query(
                "UPDATE wallets SET balance = balance + ?, bonus_balance = bonus_balance + ? \
                 WHERE user_id = ?",
            )
            .bind(bonus.signup_bonus)
            .bind(bonus.signup_bonus)
            .bind(&id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO transactions (user_id, type, amount, status, admin_note, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(TransactionType::SignupBonus.as_str())
            .bind(bonus.signup_bonus)
            .bind(TransactionStatus::Completed.as_str())
            .bind("Welcome bonus")
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(WorkflowError::from)?;

        info!(
            user = %id,
            username = %account.username,
            referred = referred_by.is_some(),
            signup_bonus = bonus.signup_bonus,
            "account registered"
        );

        self.get_user(&id).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account<'a>(username: &'a str, email: &'a str) -> NewAccount<'a> {
        NewAccount {
            username,
            email,
            password_hash: "hash",
            phone: None,
            invite_code: None,
        }
    }

    #[tokio::test]
    async fn register_creates_user_and_zero_wallet() {
        let db = Database::open_in_memory().await.unwrap();

        let user = db
            .register_account(&account("alice", "alice@arena.gg"), &BonusConfig::default())
            .await
            .unwrap();

        assert_eq!(user.role, "player");
        assert_eq!(user.referral_code.len(), 8);
        assert!(user.referred_by.is_none());

        let wallet = db.get_wallet(&user.id).await.unwrap();
        assert_eq!(wallet.balance, 0);
        assert_eq!(wallet.bonus_balance, 0);
        assert!(db.list_transactions(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signup_bonus_is_credited_and_logged() {
        let db = Database::open_in_memory().await.unwrap();
        let bonus = BonusConfig {
            signup_bonus: 250,
            referral_bonus_percent: 5,
        };

        let user = db
            .register_account(&account("bob", "bob@arena.gg"), &bonus)
            .await
            .unwrap();

        let wallet = db.get_wallet(&user.id).await.unwrap();
        assert_eq!(wallet.balance, 250);
        assert_eq!(wallet.bonus_balance, 250);

        let txs = db.list_transactions(&user.id).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, "signup_bonus");
        assert_eq!(txs[0].status, "completed");
        assert_eq!(txs[0].amount, 250);
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        db.register_account(&account("carol", "carol@arena.gg"), &BonusConfig::default())
            .await
            .unwrap();

        let err = db
            .register_account(&account("carol", "other@arena.gg"), &BonusConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        let err = db
            .register_account(&account("other", "carol@arena.gg"), &BonusConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
    }

    #[tokio::test]
    async fn invite_code_links_referrer() {
        let db = Database::open_in_memory().await.unwrap();
        let referrer = db
            .register_account(&account("dan", "dan@arena.gg"), &BonusConfig::default())
            .await
            .unwrap();

        let invited = db
            .register_account(
                &NewAccount {
                    invite_code: Some(&referrer.referral_code),
                    ..account("erin", "erin@arena.gg")
                },
                &BonusConfig::default(),
            )
            .await
            .unwrap();

        assert_eq!(invited.referred_by.as_deref(), Some(referrer.id.as_str()));
    }

    #[tokio::test]
    async fn unknown_invite_code_is_ignored() {
        let db = Database::open_in_memory().await.unwrap();

        let user = db
            .register_account(
                &NewAccount {
                    invite_code: Some("NOSUCHCD"),
                    ..account("frank", "frank@arena.gg")
                },
                &BonusConfig::default(),
            )
            .await
            .unwrap();

        assert!(user.referred_by.is_none());
    }

    #[tokio::test]
    async fn empty_fields_are_invalid_input() {
        let db = Database::open_in_memory().await.unwrap();

        let err = db
            .register_account(&account("", "x@arena.gg"), &BonusConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidInput(_)));
    }
}
