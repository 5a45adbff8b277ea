//! Sparesti ledger - account balances and their transaction history.
//!
//! The ledger keeps one balance per account and a log of every transaction
//! posted to it. It is a library consumed by the user-management and HTTP
//! layers of the Sparesti application.
//!
//! # Architecture
//!
//! - **Service**: [`LedgerService`] owns validation, locking order and
//!   unit-of-work boundaries
//! - **Storage**: anything implementing [`store::LedgerStore`]; PostgreSQL
//!   through sqlx ([`PgStore`]) or in-process ([`MemoryStore`])
//! - **Money**: `rust_decimal::Decimal`, signed
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), sparesti_ledger::AppError> {
//! use rust_decimal::Decimal;
//! use sparesti_ledger::{LedgerService, MemoryStore, NewAccount};
//!
//! let ledger = LedgerService::new(MemoryStore::new());
//! ledger.create_account(NewAccount { account_nr: 1, owner_id: 7 }).await?;
//! ledger.create_account(NewAccount { account_nr: 2, owner_id: 7 }).await?;
//! ledger.transfer_money(1, 2, Decimal::new(2500, 2)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, ErrorKind};
pub use models::{
    account::{Account, NewAccount},
    transaction::{AMOUNT_LIMIT, AMOUNT_SCALE, NewTransaction, TRANSFER_CATEGORY, Transaction},
};
pub use services::ledger_service::{LedgerService, RECENT_WINDOW_DAYS};
pub use store::{MemoryStore, PgStore};
