//! Shared types and configuration for Tally.
//!
//! This crate provides common types used across all other crates:
//! - Validated account identifiers and their total order
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, LedgerConfig, WorkloadConfig};
pub use types::{AccountId, AccountIdError};
