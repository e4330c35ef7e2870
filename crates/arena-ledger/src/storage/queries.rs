//! Read-side and administrative queries for the Arena ledger.
//!
//! Everything here is either a plain read or a single-statement admin
//! write with no settlement semantics. Money movement lives in
//! `crate::workflows`.

use arena_core::config::BonusConfig;
use arena_core::db::unix_timestamp;

use super::db::{Database, DatabaseError};
use super::models::{JoinedTournament, RedeemCode, Tournament, TournamentParticipant, Transaction, User, Wallet};

/// Tournament fields shared between creation and future edit paths.
pub struct TournamentParams<'a> {
    pub title: &'a str,
    pub game_type: &'a str,
    pub map_type: &'a str,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub per_kill: i64,
    pub start_time: i64,
    pub max_players: i64,
}

impl TournamentParams<'_> {
    /// Bind the common tournament fields to an existing query builder.
    fn bind_to<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        query
            .bind(self.title)
            .bind(self.game_type)
            .bind(self.map_type)
            .bind(self.entry_fee)
            .bind(self.prize_pool)
            .bind(self.per_kill)
            .bind(self.start_time)
            .bind(self.max_players)
    }
}

/// Promo code fields for creation.
pub struct RedeemCodeParams<'a> {
    pub code: &'a str,
    pub amount: i64,
    pub max_uses: i64,
    pub expires_at: Option<i64>,
}

impl Database {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    /// Get a user by email (credential verification happens at the boundary).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Look up a user by their own referral code.
    pub async fn get_user_by_referral_code(
        &self,
        referral_code: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = ?")
            .bind(referral_code)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Set or clear the ban flag on a user (admin only at the boundary).
    pub async fn set_user_banned(&self, id: &str, banned: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET is_banned = ? WHERE id = ?")
            .bind(i64::from(banned))
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Change a user's role (admin only at the boundary).
    pub async fn set_user_role(&self, id: &str, role: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Wallet queries
    // =========================================================================

    /// Get the wallet for a user.
    pub async fn get_wallet(&self, user_id: &str) -> Result<Wallet, DatabaseError> {
        sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Wallet for user {user_id}")))
    }

    // =========================================================================
    // Transaction queries
    // =========================================================================

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: i64) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Transaction {id}")))
    }

    /// List a user's transactions, newest first.
    pub async fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, DatabaseError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// List pending deposit/withdrawal requests, oldest first, for the
    /// admin approval queue.
    pub async fn list_pending_payments(&self) -> Result<Vec<Transaction>, DatabaseError> {
        let rows = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE status = 'pending' \
             AND type IN ('deposit', 'withdrawal') ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    // =========================================================================
    // Tournament queries
    // =========================================================================

    /// Create a new tournament record.
    pub async fn create_tournament(
        &self,
        id: &str,
        created_by: &str,
        params: &TournamentParams<'_>,
    ) -> Result<Tournament, DatabaseError> {
        let now = unix_timestamp();

        let base = sqlx::query(
            "INSERT INTO tournaments (id, title, game_type, map_type, entry_fee, prize_pool, \
             per_kill, start_time, max_players, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id);
        params
            .bind_to(base)
            .bind(created_by)
            .bind(now)
            .execute(self.pool())
            .await?;

        self.get_tournament(id).await
    }

    /// Get a tournament by ID.
    pub async fn get_tournament(&self, id: &str) -> Result<Tournament, DatabaseError> {
        sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Tournament {id}")))
    }

    /// List all tournaments, latest start time first.
    pub async fn list_tournaments(&self) -> Result<Vec<Tournament>, DatabaseError> {
        let rows = sqlx::query_as::<_, Tournament>(
            "SELECT * FROM tournaments ORDER BY start_time DESC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// List the tournaments a user has joined, including the in-game name
    /// they registered with.
    pub async fn list_user_tournaments(
        &self,
        user_id: &str,
    ) -> Result<Vec<JoinedTournament>, DatabaseError> {
        let rows = sqlx::query_as::<_, JoinedTournament>(
            "SELECT t.*, tp.game_username FROM tournaments t \
             JOIN tournament_participants tp ON t.id = tp.tournament_id \
             WHERE tp.user_id = ? ORDER BY t.start_time DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// List the participants of a tournament.
    pub async fn list_participants(
        &self,
        tournament_id: &str,
    ) -> Result<Vec<TournamentParticipant>, DatabaseError> {
        let rows = sqlx::query_as::<_, TournamentParticipant>(
            "SELECT * FROM tournament_participants WHERE tournament_id = ? ORDER BY joined_at ASC",
        )
        .bind(tournament_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Set the room credentials on a tournament.
    pub async fn update_room_details(
        &self,
        id: &str,
        room_id: &str,
        room_password: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE tournaments SET room_id = ?, room_password = ? WHERE id = ?")
            .bind(room_id)
            .bind(room_password)
            .bind(id)
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Tournament {id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Redeem code queries
    // =========================================================================

    /// Create a new promo code.
    pub async fn create_redeem_code(
        &self,
        id: &str,
        params: &RedeemCodeParams<'_>,
    ) -> Result<RedeemCode, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO redeem_codes (id, code, amount, max_uses, expires_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(params.code)
        .bind(params.amount)
        .bind(params.max_uses)
        .bind(params.expires_at)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_redeem_code(params.code).await
    }

    /// Get a promo code by its code string.
    pub async fn get_redeem_code(&self, code: &str) -> Result<RedeemCode, DatabaseError> {
        sqlx::query_as::<_, RedeemCode>("SELECT * FROM redeem_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Redeem code {code}")))
    }

    /// Deactivate a promo code.
    pub async fn deactivate_redeem_code(&self, code: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE redeem_codes SET is_active = 0 WHERE code = ?")
            .bind(code)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Settings queries
    // =========================================================================

    /// Resolve the bonus settings: persisted `settings` rows override the
    /// configured defaults. The core reads settings, never writes them.
    pub async fn bonus_settings(&self, defaults: &BonusConfig) -> Result<BonusConfig, DatabaseError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM settings WHERE key IN ('signup_bonus', 'referral_bonus_percent')",
        )
        .fetch_all(self.pool())
        .await?;

        let mut merged = *defaults;
        for (key, value) in rows {
            let Ok(n) = value.parse::<i64>() else { continue };
            match key.as_str() {
                "signup_bonus" => merged.signup_bonus = n,
                "referral_bonus_percent" => merged.referral_bonus_percent = n,
                _ => {}
            }
        }
        Ok(merged)
    }
}
