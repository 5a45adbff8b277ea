//! Account data models and request types.
//!
//! This module defines:
//! - `Account`: stored entity, also the snapshot handed back to callers
//! - `NewAccount`: request body for opening an account

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::transaction::AMOUNT_LIMIT};

/// Represents an account record.
///
/// # Database Table
///
/// Maps to the `accounts` table. Each account:
/// - Is keyed by its account number, which never changes
/// - Belongs to one user (via `owner_id`)
/// - Has a signed balance equal to the sum of its transaction amounts
///
/// Transactions point back at the account through their own `account_nr`;
/// the account holds no list of them.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique, immutable account number
    pub account_nr: i32,

    /// Identifier of the user that owns this account
    pub owner_id: i64,

    /// Current balance
    ///
    /// Only ever changed by posting a transaction.
    pub balance: Decimal,
}

impl Account {
    /// A freshly opened account with a zero balance.
    pub fn open(account_nr: i32, owner_id: i64) -> Self {
        Self {
            account_nr,
            owner_id,
            balance: Decimal::ZERO,
        }
    }

    /// Apply a signed amount to the balance.
    ///
    /// Fails with `InvalidRequest` and leaves the balance untouched when the
    /// result would fall outside [`AMOUNT_LIMIT`].
    pub fn alter_balance(&mut self, amount: Decimal) -> Result<(), AppError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .filter(|balance| balance.abs() < AMOUNT_LIMIT)
            .ok_or_else(|| AppError::InvalidRequest("Balance out of range".to_string()))?;
        Ok(())
    }
}

/// Request body for opening a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_nr": 12345678,
///   "owner_id": 1
/// }
/// ```
///
/// # Validation
///
/// - `account_nr`: must be positive and not already taken
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub account_nr: i32,
    pub owner_id: i64,
}
