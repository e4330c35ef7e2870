//! `SQLite` storage for the Arena ledger.
//!
//! Provides persistence for users, wallets, transactions, tournaments,
//! participants, redeem codes, and settings.

mod db;
mod models;
mod queries;

pub use db::{Database, DatabaseError};
pub use models::*;
pub use queries::{RedeemCodeParams, TournamentParams};
