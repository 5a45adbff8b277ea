//! Storage seam for the ledger.
//!
//! The ledger service never talks to a database directly. It opens a
//! [`UnitOfWork`] through a [`LedgerStore`], reads and writes accounts and
//! transactions through it, and finally commits or rolls it back.
//!
//! # Locking
//!
//! [`AccountStore::find_by_number_with_lock`] takes an exclusive lock on one
//! account number. The lock is held until the unit of work that took it is
//! committed, rolled back or dropped, and taking it again inside the same
//! unit of work does not block. Units of work that lock different account
//! numbers never contend.
//!
//! # Implementations
//!
//! - [`postgres::PgStore`]: PostgreSQL via sqlx, locks are `FOR UPDATE` row locks
//! - [`memory::MemoryStore`]: in-process, locks are per-account async mutexes

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{account::Account, transaction::Transaction},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Account persistence operations.
pub trait AccountStore {
    /// Look up an account without locking it.
    fn find_by_number(
        &mut self,
        account_nr: i32,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Lock an account number for the rest of the unit of work, then look the
    /// account up.
    fn find_by_number_with_lock(
        &mut self,
        account_nr: i32,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    fn exists_by_number(
        &mut self,
        account_nr: i32,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// All accounts owned by `owner_id`, ordered by account number.
    fn find_all_by_owner(
        &mut self,
        owner_id: i64,
    ) -> impl Future<Output = Result<Vec<Account>, AppError>> + Send;

    /// Insert the account, or overwrite the stored row with the same number.
    ///
    /// Inserting a number that another unit of work inserted concurrently
    /// fails with [`AppError::DuplicateAccount`].
    fn save_account(
        &mut self,
        account: &Account,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Transaction persistence operations.
///
/// Lists are ordered by date, then id.
pub trait TransactionStore {
    fn find_by_id(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Transaction>, AppError>> + Send;

    fn find_by_account(
        &mut self,
        account_nr: i32,
    ) -> impl Future<Output = Result<Vec<Transaction>, AppError>> + Send;

    /// Transactions of one account dated on or after `since`.
    fn find_by_account_since(
        &mut self,
        account_nr: i32,
        since: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Transaction>, AppError>> + Send;

    fn save_transaction(
        &mut self,
        transaction: &Transaction,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// An all-or-nothing group of reads and writes.
///
/// Dropping a unit of work without committing it discards every write made
/// through it and releases its locks.
pub trait UnitOfWork: AccountStore + TransactionStore + Send {
    fn commit(self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Something a unit of work can be opened against.
pub trait LedgerStore: Send + Sync {
    type Work: UnitOfWork;

    fn begin(&self) -> impl Future<Output = Result<Self::Work, AppError>> + Send;
}
