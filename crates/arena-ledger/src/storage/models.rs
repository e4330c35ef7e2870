//! Database models for the Arena ledger.

use serde::{Deserialize, Serialize};

/// User account record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: String,
    pub is_banned: i64,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: i64,
}

/// Wallet record from the database. One per user; all amounts are
/// integer minor currency units and never negative.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
    pub bonus_balance: i64,
    pub total_deposited: i64,
    pub total_withdrawn: i64,
}

/// Transaction record from the database. Append-only; the only permitted
/// mutation is the pending -> completed/rejected transition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: i64,
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_proof: Option<String>,
    pub manual_reference: Option<String>,
    pub admin_note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Tournament record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tournament {
    pub id: String,
    pub title: String,
    pub game_type: String,
    pub map_type: String,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub per_kill: i64,
    pub start_time: i64,
    pub max_players: i64,
    pub current_players: i64,
    pub status: String,
    pub room_id: Option<String>,
    pub room_password: Option<String>,
    pub created_by: String,
    pub created_at: i64,
}

/// Participant join record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TournamentParticipant {
    pub id: i64,
    pub tournament_id: String,
    pub user_id: String,
    pub game_username: String,
    pub joined_at: i64,
}

/// A tournament joined by a particular user, including the in-game name
/// they registered with.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JoinedTournament {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub tournament: Tournament,
    pub game_username: String,
}

/// Promo code record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RedeemCode {
    pub id: String,
    pub code: String,
    pub amount: i64,
    pub max_uses: i64,
    pub current_uses: i64,
    pub is_active: i64,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

/// Redemption record enforcing single use per (user, code).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RedeemHistory {
    pub id: i64,
    pub user_id: String,
    pub code_id: String,
    pub redeemed_at: i64,
}

/// User role enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player" => Some(Self::Player),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    JoinFee,
    Refund,
    RedeemCode,
    SignupBonus,
    ReferralBonus,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::JoinFee => "join_fee",
            Self::Refund => "refund",
            Self::RedeemCode => "redeem_code",
            Self::SignupBonus => "signup_bonus",
            Self::ReferralBonus => "referral_bonus",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction status enum. Transitions only pending -> completed or
/// pending -> rejected, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl TransactionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tournament lifecycle enum. Cancellation is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
