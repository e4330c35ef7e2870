//! Arena Ledger Library
//!
//! Transactional money-movement core for the Arena gaming platform:
//! - SQLite storage for users, wallets, transactions, tournaments, and
//!   redeem codes
//! - Settlement workflows (join, deposit, withdrawal, approval, cancel
//!   with refunds, redeem) executed as single atomic units of work
//! - The thin boundary contract consumed by an external request router

pub mod api;
pub mod error;
pub mod storage;
pub mod workflows;

pub use error::{StatusClass, WorkflowError};
pub use storage::{Database, DatabaseError};
