//! Tournament settlement workflows: paid join and cancel-with-refund.

use arena_core::db::unix_timestamp;
use tracing::info;

use super::begin_immediate;
use crate::error::WorkflowError;
use crate::storage::{Database, Tournament, TournamentStatus, TransactionStatus, TransactionType};

impl Database {
    /// Join a tournament, paying the entry fee.
    ///
    /// Validation order follows the settlement contract: existence,
    /// capacity, lifecycle state, duplicate join, then balance. The fee
    /// debit, participant row, player-count increment, and `join_fee`
    /// transaction commit atomically or not at all, so two concurrent
    /// joins can never both pass the capacity or balance check.
    pub async fn join_tournament(
        &self,
        tournament_id: &str,
        user_id: &str,
        game_username: &str,
    ) -> Result<(), WorkflowError> {
        if game_username.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "game username is required".to_string(),
            ));
        }

        let mut tx = begin_immediate(self).await?;

        let tournament: Option<Tournament> =
            sqlx::query_as("SELECT * FROM tournaments WHERE id = ?")
                .bind(tournament_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(tournament) = tournament else {
            return Err(WorkflowError::NotFound("Tournament".to_string()));
        };

        if tournament.current_players >= tournament.max_players {
            return Err(WorkflowError::Conflict("Tournament is full".to_string()));
        }
        if tournament.status != TournamentStatus::Upcoming.as_str() {
            return Err(WorkflowError::Conflict(
                "Tournament is not open for joining".to_string(),
            ));
        }

        let already: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM tournament_participants WHERE tournament_id = ? AND user_id = ?",
        )
        .bind(tournament_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if already.is_some() {
            return Err(WorkflowError::Conflict("Already joined".to_string()));
        }

        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(balance) = balance else {
            return Err(WorkflowError::NotFound("Wallet".to_string()));
        };
        if balance < tournament.entry_fee {
            return Err(WorkflowError::InsufficientFunds);
        }

        let now = unix_timestamp();

        sqlx::query("UPDATE wallets SET balance = balance - ? WHERE user_id = ?")
            .bind(tournament.entry_fee)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO tournament_participants (tournament_id, user_id, game_username, joined_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(tournament_id)
        .bind(user_id)
        .bind(game_username)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE tournaments SET current_players = current_players + 1 WHERE id = ?")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO transactions (user_id, type, amount, status, admin_note, created_at, \
             updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(TransactionType::JoinFee.as_str())
        .bind(tournament.entry_fee)
        .bind(TransactionStatus::Completed.as_str())
        .bind(format!("Joined tournament {tournament_id}"))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(WorkflowError::from)?;

        info!(
            tournament = %tournament_id,
            user = %user_id,
            fee = tournament.entry_fee,
            "tournament joined"
        );
        Ok(())
    }

    /// Cancel a tournament and refund every participant's entry fee.
    ///
    /// All refunds and the terminal status flip are one unit of work; the
    /// status only changes after the last refund, so a crash can never
    /// leave some participants refunded under a still-active tournament.
    /// Returns the number of participants refunded.
    pub async fn cancel_tournament(&self, tournament_id: &str) -> Result<u64, WorkflowError> {
        let mut tx = begin_immediate(self).await?;

        let tournament: Option<Tournament> =
            sqlx::query_as("SELECT * FROM tournaments WHERE id = ?")
                .bind(tournament_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(tournament) = tournament else {
            return Err(WorkflowError::NotFound("Tournament".to_string()));
        };
        if tournament.status == TournamentStatus::Cancelled.as_str() {
            return Err(WorkflowError::Conflict("Already cancelled".to_string()));
        }

        let participants: Vec<(String,)> =
            sqlx::query_as("SELECT user_id FROM tournament_participants WHERE tournament_id = ?")
                .bind(tournament_id)
                .fetch_all(&mut *tx)
                .await?;

        let now = unix_timestamp();
        for (participant_id,) in &participants {
            sqlx::query("UPDATE wallets SET balance = balance + ? WHERE user_id = ?")
                .bind(tournament.entry_fee)
                .bind(participant_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO transactions (user_id, type, amount, status, admin_note, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(participant_id)
            .bind(TransactionType::Refund.as_str())
            .bind(tournament.entry_fee)
            .bind(TransactionStatus::Completed.as_str())
            .bind(format!("Refund for tournament {tournament_id}"))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE tournaments SET status = ? WHERE id = ?")
            .bind(TournamentStatus::Cancelled.as_str())
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await.map_err(WorkflowError::from)?;

        let refunded = participants.len() as u64;
        info!(tournament = %tournament_id, refunded, "tournament cancelled");
        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TournamentParams;
    use crate::workflows::NewAccount;
    use arena_core::config::BonusConfig;

    async fn user(db: &Database, name: &str, funds: i64) -> String {
        let email = format!("{name}@arena.gg");
        let user = db
            .register_account(
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
            .unwrap();
        if funds > 0 {
            sqlx::query("UPDATE wallets SET balance = ? WHERE user_id = ?")
                .bind(funds)
                .bind(&user.id)
                .execute(db.pool())
                .await
                .unwrap();
        }
        user.id
    }

    async fn tournament(db: &Database, id: &str, creator: &str, fee: i64, cap: i64) {
        db.create_tournament(
            id,
            creator,
            &TournamentParams {
                title: "Test Cup",
                game_type: "br",
                map_type: "island",
                entry_fee: fee,
                prize_pool: 1000,
                per_kill: 0,
                start_time: 1_900_000_000,
                max_players: cap,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn join_debits_fee_and_increments_count() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let player = user(&db, "p1", 500).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        db.join_tournament("t1", &player, "P1_ingame").await.unwrap();

        assert_eq!(db.get_wallet(&player).await.unwrap().balance, 400);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 1);

        let txs = db.list_transactions(&player).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].tx_type, "join_fee");
        assert_eq!(txs[0].status, "completed");
        assert_eq!(txs[0].amount, 100);

        let joined = db.list_user_tournaments(&player).await.unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].game_username, "P1_ingame");
    }

    #[tokio::test]
    async fn double_join_conflicts_and_debits_once() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let player = user(&db, "p1", 500).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        db.join_tournament("t1", &player, "P1").await.unwrap();
        let err = db.join_tournament("t1", &player, "P1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        assert_eq!(db.get_wallet(&player).await.unwrap().balance, 400);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 1);
    }

    #[tokio::test]
    async fn full_tournament_rejects_join() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let p1 = user(&db, "p1", 500).await;
        let p2 = user(&db, "p2", 500).await;
        tournament(&db, "t1", &admin, 100, 1).await;

        db.join_tournament("t1", &p1, "P1").await.unwrap();
        let err = db.join_tournament("t1", &p2, "P2").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        // Loser's wallet untouched, no partial mutation.
        assert_eq!(db.get_wallet(&p2).await.unwrap().balance, 500);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 1);
    }

    #[tokio::test]
    async fn non_upcoming_tournament_is_not_joinable() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let player = user(&db, "p1", 500).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        sqlx::query("UPDATE tournaments SET status = 'ongoing' WHERE id = 't1'")
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.join_tournament("t1", &player, "P1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));
        assert_eq!(db.get_wallet(&player).await.unwrap().balance, 500);
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_join() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let player = user(&db, "p1", 50).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        let err = db.join_tournament("t1", &player, "P1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InsufficientFunds));
        assert_eq!(db.get_wallet(&player).await.unwrap().balance, 50);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 0);
    }

    #[tokio::test]
    async fn missing_tournament_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let player = user(&db, "p1", 500).await;

        let err = db.join_tournament("nope", &player, "P1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancel_refunds_every_participant() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let p1 = user(&db, "p1", 300).await;
        let p2 = user(&db, "p2", 300).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        db.join_tournament("t1", &p1, "P1").await.unwrap();
        db.join_tournament("t1", &p2, "P2").await.unwrap();

        let refunded = db.cancel_tournament("t1").await.unwrap();
        assert_eq!(refunded, 2);

        assert_eq!(db.get_wallet(&p1).await.unwrap().balance, 300);
        assert_eq!(db.get_wallet(&p2).await.unwrap().balance, 300);
        assert_eq!(db.get_tournament("t1").await.unwrap().status, "cancelled");

        let txs = db.list_transactions(&p1).await.unwrap();
        assert!(txs.iter().any(|t| t.tx_type == "refund" && t.amount == 100));
    }

    #[tokio::test]
    async fn second_cancel_conflicts_without_further_refunds() {
        let db = Database::open_in_memory().await.unwrap();
        let admin = user(&db, "admin", 0).await;
        let p1 = user(&db, "p1", 300).await;
        tournament(&db, "t1", &admin, 100, 10).await;
        db.join_tournament("t1", &p1, "P1").await.unwrap();

        db.cancel_tournament("t1").await.unwrap();
        let err = db.cancel_tournament("t1").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict(_)));

        // Balance refunded exactly once.
        assert_eq!(db.get_wallet(&p1).await.unwrap().balance, 300);
        let refunds = db
            .list_transactions(&p1)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.tx_type == "refund")
            .count();
        assert_eq!(refunds, 1);
    }

    #[tokio::test]
    async fn concurrent_joins_fill_exactly_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("arena.db")).await.unwrap();

        let admin = user(&db, "admin", 0).await;
        tournament(&db, "t1", &admin, 100, 3).await;

        let mut players = Vec::new();
        for i in 0..6 {
            players.push(user(&db, &format!("p{i}"), 500).await);
        }

        let mut handles = Vec::new();
        for player in players.clone() {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.join_tournament("t1", &player, "ign").await
            }));
        }

        let mut ok = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(WorkflowError::Conflict(_)) => full += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(ok, 3);
        assert_eq!(full, 3);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 3);

        // Exactly the winners were debited.
        let mut debited = 0;
        for player in &players {
            let balance = db.get_wallet(player).await.unwrap().balance;
            assert!(balance == 400 || balance == 500);
            if balance == 400 {
                debited += 1;
            }
        }
        assert_eq!(debited, 3);
    }

    #[tokio::test]
    async fn concurrent_double_join_yields_single_debit() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("arena.db")).await.unwrap();

        let admin = user(&db, "admin", 0).await;
        let player = user(&db, "p1", 500).await;
        tournament(&db, "t1", &admin, 100, 10).await;

        let a = {
            let (db, player) = (db.clone(), player.clone());
            tokio::spawn(async move { db.join_tournament("t1", &player, "ign").await })
        };
        let b = {
            let (db, player) = (db.clone(), player.clone());
            tokio::spawn(async move { db.join_tournament("t1", &player, "ign").await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        assert_eq!(db.get_wallet(&player).await.unwrap().balance, 400);
        assert_eq!(db.get_tournament("t1").await.unwrap().current_players, 1);
    }
}
