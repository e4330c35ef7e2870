//! Arena Core Library
//!
//! Shared functionality for Arena components:
//! - Configuration resolution and bonus defaults
//! - SQLite pool helpers and database scaffolding
//! - Tracing initialisation
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod tracing_init;

pub use config::{BonusConfig, Config};
pub use error::{Error, Result};
