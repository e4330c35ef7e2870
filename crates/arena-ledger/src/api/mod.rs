//! Boundary contract for the external request router.
//!
//! The router authenticates the caller, deserializes the body into one of
//! the typed requests below, and invokes exactly one dispatch function.
//! Each dispatch applies the role gate, calls a single workflow or query,
//! and wraps the outcome in an `ApiResponse` whose `StatusClass` the
//! transport maps to a wire status code. No HTTP, JWT, or file handling
//! lives here.

use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use arena_core::config::BonusConfig;

use crate::error::{StatusClass, WorkflowError};
use crate::storage::{
    Database, DatabaseError, JoinedTournament, RedeemCodeParams, Role, Tournament,
    TournamentParams, Transaction, User, Wallet,
};
use crate::workflows::{NewAccount, PaymentDecision};

/// Verified caller identity, produced by the credential collaborator.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: Role,
    pub is_banned: bool,
}

const ANY_ROLE: &[Role] = &[Role::Player, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

impl AuthContext {
    /// Reject banned callers and callers whose role is not in the allowed
    /// set for the route.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), WorkflowError> {
        if self.is_banned {
            return Err(WorkflowError::Forbidden("Account is banned".to_string()));
        }
        if !allowed.contains(&self.role) {
            return Err(WorkflowError::Forbidden(format!(
                "Role {} is not authorized for this route",
                self.role
            )));
        }
        Ok(())
    }
}

/// Build an `AuthContext` from the identity the token layer extracted.
/// `None` (missing/invalid token) and unknown users are both opaque
/// `Unauthorized`.
pub async fn authenticate(
    db: &Database,
    user_id: Option<&str>,
) -> Result<AuthContext, WorkflowError> {
    let Some(user_id) = user_id else {
        return Err(WorkflowError::Unauthorized);
    };
    // Only an absent user is an identity failure; storage trouble is ours.
    let user = match db.get_user(user_id).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound(_)) => return Err(WorkflowError::Unauthorized),
        Err(other) => return Err(other.into()),
    };
    let role = Role::parse(&user.role)
        .ok_or_else(|| WorkflowError::Internal(format!("unknown role {:?}", user.role)))?;
    Ok(AuthContext {
        user_id: user.id,
        role,
        is_banned: user.is_banned != 0,
    })
}

/// Uniform response envelope: `{ success, data | message }` plus the
/// status classification the transport maps to a status code.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    pub status: StatusClass,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status: StatusClass::Ok,
        }
    }

    pub fn from_error(err: &WorkflowError) -> Self {
        if matches!(err, WorkflowError::Internal(_)) {
            error!(detail = %err, "workflow failed");
        }
        Self {
            success: false,
            data: None,
            message: Some(err.public_message()),
            status: err.status(),
        }
    }
}

fn respond<T>(result: Result<T, WorkflowError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(err) => ApiResponse::from_error(&err),
    }
}

// =============================================================================
// Request payloads
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub game_username: String,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: i64,
    pub payment_method: String,
    /// Stored-proof reference supplied by the upload collaborator.
    pub payment_proof: String,
    pub manual_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: i64,
    pub payment_method: String,
    pub account_details: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    /// `"approved"` or `"rejected"`.
    pub decision: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub title: String,
    pub game_type: String,
    pub map_type: String,
    pub entry_fee: i64,
    pub prize_pool: i64,
    pub per_kill: i64,
    pub start_time: i64,
    pub max_players: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub room_id: String,
    pub room_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRedeemCodeRequest {
    pub code: String,
    pub amount: i64,
    pub max_uses: i64,
    pub expires_at: Option<i64>,
}

// =============================================================================
// Public routes
// =============================================================================

/// Register a new account. Live bonus values come from the settings
/// table, falling back to the configured defaults.
pub async fn register(
    db: &Database,
    defaults: &BonusConfig,
    req: &RegisterRequest,
) -> ApiResponse<User> {
    let result = async {
        let bonus = db.bonus_settings(defaults).await?;
        db.register_account(
            &NewAccount {
                username: &req.username,
                email: &req.email,
                password_hash: &req.password_hash,
                phone: req.phone.as_deref(),
                invite_code: req.referral_code.as_deref(),
            },
            &bonus,
        )
        .await
    };
    respond(result.await)
}

pub async fn list_tournaments(db: &Database) -> ApiResponse<Vec<Tournament>> {
    respond(db.list_tournaments().await.map_err(Into::into))
}

pub async fn get_tournament(db: &Database, id: &str) -> ApiResponse<Tournament> {
    respond(db.get_tournament(id).await.map_err(Into::into))
}

// =============================================================================
// Player routes
// =============================================================================

pub async fn get_wallet(db: &Database, auth: &AuthContext) -> ApiResponse<Wallet> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.get_wallet(&auth.user_id).await.map_err(Into::into)
    };
    respond(result.await)
}

pub async fn list_transactions(db: &Database, auth: &AuthContext) -> ApiResponse<Vec<Transaction>> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.list_transactions(&auth.user_id).await.map_err(Into::into)
    };
    respond(result.await)
}

pub async fn my_tournaments(
    db: &Database,
    auth: &AuthContext,
) -> ApiResponse<Vec<JoinedTournament>> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.list_user_tournaments(&auth.user_id).await.map_err(Into::into)
    };
    respond(result.await)
}

pub async fn join_tournament(
    db: &Database,
    auth: &AuthContext,
    tournament_id: &str,
    req: &JoinRequest,
) -> ApiResponse<()> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.join_tournament(tournament_id, &auth.user_id, &req.game_username)
            .await
    };
    respond(result.await)
}

pub async fn request_deposit(
    db: &Database,
    auth: &AuthContext,
    req: &DepositRequest,
) -> ApiResponse<Transaction> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.request_deposit(
            &auth.user_id,
            req.amount,
            &req.payment_method,
            &req.payment_proof,
            req.manual_reference.as_deref(),
        )
        .await
    };
    respond(result.await)
}

pub async fn request_withdrawal(
    db: &Database,
    auth: &AuthContext,
    req: &WithdrawalRequest,
) -> ApiResponse<Transaction> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.request_withdrawal(
            &auth.user_id,
            req.amount,
            &req.payment_method,
            &req.account_details,
        )
        .await
    };
    respond(result.await)
}

pub async fn redeem_code(db: &Database, auth: &AuthContext, req: &RedeemRequest) -> ApiResponse<i64> {
    let result = async {
        auth.require_role(ANY_ROLE)?;
        db.redeem(&auth.user_id, &req.code).await
    };
    respond(result.await)
}

// =============================================================================
// Admin routes
// =============================================================================

pub async fn create_tournament(
    db: &Database,
    auth: &AuthContext,
    req: &CreateTournamentRequest,
) -> ApiResponse<Tournament> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        if req.title.trim().is_empty() || req.max_players <= 0 || req.entry_fee < 0 {
            return Err(WorkflowError::InvalidInput(
                "title, positive capacity, and non-negative fee are required".to_string(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        db.create_tournament(
            &id,
            &auth.user_id,
            &TournamentParams {
                title: &req.title,
                game_type: &req.game_type,
                map_type: &req.map_type,
                entry_fee: req.entry_fee,
                prize_pool: req.prize_pool,
                per_kill: req.per_kill,
                start_time: req.start_time,
                max_players: req.max_players,
            },
        )
        .await
        .map_err(Into::into)
    };
    respond(result.await)
}

pub async fn update_room(
    db: &Database,
    auth: &AuthContext,
    tournament_id: &str,
    req: &UpdateRoomRequest,
) -> ApiResponse<()> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        db.update_room_details(tournament_id, &req.room_id, &req.room_password)
            .await
            .map_err(Into::into)
    };
    respond(result.await)
}

/// Cancel a tournament, refunding every participant. Returns the number
/// of refunds issued.
pub async fn cancel_tournament(
    db: &Database,
    auth: &AuthContext,
    tournament_id: &str,
) -> ApiResponse<u64> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        db.cancel_tournament(tournament_id).await
    };
    respond(result.await)
}

pub async fn pending_payments(db: &Database, auth: &AuthContext) -> ApiResponse<Vec<Transaction>> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        db.list_pending_payments().await.map_err(Into::into)
    };
    respond(result.await)
}

pub async fn process_payment(
    db: &Database,
    auth: &AuthContext,
    transaction_id: i64,
    req: &ProcessPaymentRequest,
    defaults: &BonusConfig,
) -> ApiResponse<Transaction> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        let decision = match req.decision.as_str() {
            "approved" => PaymentDecision::Approved,
            "rejected" => PaymentDecision::Rejected,
            other => {
                return Err(WorkflowError::InvalidInput(format!(
                    "unknown decision {other:?}"
                )));
            }
        };
        let bonus = db.bonus_settings(defaults).await?;
        db.process_payment(transaction_id, decision, req.note.as_deref(), &bonus)
            .await
    };
    respond(result.await)
}

pub async fn create_redeem_code(
    db: &Database,
    auth: &AuthContext,
    req: &CreateRedeemCodeRequest,
) -> ApiResponse<crate::storage::RedeemCode> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        if req.code.trim().is_empty() || req.amount <= 0 || req.max_uses <= 0 {
            return Err(WorkflowError::InvalidInput(
                "code, positive amount, and positive max_uses are required".to_string(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        db.create_redeem_code(
            &id,
            &RedeemCodeParams {
                code: &req.code,
                amount: req.amount,
                max_uses: req.max_uses,
                expires_at: req.expires_at,
            },
        )
        .await
        .map_err(Into::into)
    };
    respond(result.await)
}

pub async fn set_user_banned(
    db: &Database,
    auth: &AuthContext,
    user_id: &str,
    banned: bool,
) -> ApiResponse<()> {
    let result = async {
        auth.require_role(ADMIN_ONLY)?;
        // Surface unknown users as NotFound rather than silently no-op.
        db.get_user(user_id).await?;
        db.set_user_banned(user_id, banned).await.map_err(Into::into)
    };
    respond(result.await)
}
