//! Error types for the ledger.
//!
//! This module defines every error the ledger can surface and how each one
//! is classified for callers that only care about which precondition failed.

use uuid::Uuid;

/// Ledger-wide error type.
///
/// # Error Categories
///
/// - **Validation Errors**: malformed input, e.g. a negative transfer amount
/// - **Resource Errors**: the referenced account or transaction is absent
/// - **Conflict Errors**: an account number is already taken
/// - **Storage Errors**: database or in-memory store failures
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request data is invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No account exists with the given account number.
    #[error("Account {0} not found")]
    AccountNotFound(i32),

    /// No transaction exists with the given id.
    #[error("Transaction {0} not found")]
    TransactionNotFound(Uuid),

    /// An account with the given account number already exists.
    #[error("Account number {0} already exists")]
    DuplicateAccount(i32),

    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The in-memory store's shared state was poisoned by a panicking thread.
    #[error("Could not acquire the store lock")]
    StoreLock,
}

/// Coarse classification of [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl AppError {
    /// Map each error variant onto the failure taxonomy exposed to callers.
    ///
    /// - `InvalidRequest` → `Validation`
    /// - `AccountNotFound`, `TransactionNotFound` → `NotFound`
    /// - `DuplicateAccount` → `Conflict`
    /// - `Database`, `StoreLock` → `Internal`
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidRequest(_) => ErrorKind::Validation,
            AppError::AccountNotFound(_) | AppError::TransactionNotFound(_) => ErrorKind::NotFound,
            AppError::DuplicateAccount(_) => ErrorKind::Conflict,
            AppError::Database(_) | AppError::StoreLock => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_classified_by_failed_precondition() {
        assert_eq!(
            AppError::InvalidRequest("negative".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(AppError::AccountNotFound(7).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::TransactionNotFound(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(AppError::DuplicateAccount(7).kind(), ErrorKind::Conflict);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).kind(),
            ErrorKind::Internal
        );
        assert_eq!(AppError::StoreLock.kind(), ErrorKind::Internal);
    }

    #[test]
    fn messages_name_the_offending_account() {
        assert_eq!(AppError::AccountNotFound(42).to_string(), "Account 42 not found");
        assert_eq!(
            AppError::DuplicateAccount(42).to_string(),
            "Account number 42 already exists"
        );
    }
}
