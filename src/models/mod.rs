//! Data models representing ledger entities.
//!
//! This module contains all data structures that map to database tables.

/// Account model
pub mod account;
/// Transaction model
pub mod transaction;
