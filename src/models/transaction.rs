//! Transaction data models and request types.
//!
//! This module defines:
//! - `Transaction`: stored entity representing one posted amount
//! - `NewTransaction`: what a caller supplies to post a transaction

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Category given to both legs of a transfer.
pub const TRANSFER_CATEGORY: &str = "Transfer";

/// Decimal places kept by the `NUMERIC(19, 4)` amount and balance columns.
pub const AMOUNT_SCALE: u32 = 4;

/// Exclusive bound on the magnitude of amounts and balances (10^15), the
/// integer range of a `NUMERIC(19, 4)` column.
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0);

/// Reject amounts the storage columns cannot hold exactly.
///
/// Trailing zeros don't count towards the scale, so `1.50000` is accepted.
pub fn check_amount(amount: Decimal) -> Result<(), AppError> {
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(AppError::InvalidRequest(format!(
            "Amount {amount} has more than {AMOUNT_SCALE} decimal places"
        )));
    }
    if amount.abs() >= AMOUNT_LIMIT {
        return Err(AppError::InvalidRequest(format!(
            "Amount {amount} is out of range"
        )));
    }
    Ok(())
}

/// Represents a transaction record.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - Belongs to exactly one account and is never reassigned
/// - Stores a signed amount (positive = credit, negative = debit)
/// - Is never updated or deleted on its own
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Transaction {
    /// Unique identifier for this transaction
    pub id: Uuid,

    /// Account this transaction was posted to
    pub account_nr: i32,

    /// Signed amount
    pub amount: Decimal,

    /// Category label, e.g. "Groceries" or "Transfer"
    pub category: String,

    /// Free-text description
    pub description: String,

    /// Calendar date the transaction happened on
    pub date: NaiveDate,
}

/// A transaction that has not been posted yet.
///
/// `amount` may carry at most [`AMOUNT_SCALE`] decimal places and its
/// magnitude must stay below [`AMOUNT_LIMIT`]. Posting rejects anything else
/// instead of letting the database round it.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_nr": 12345678,
///   "amount": "-49.90",
///   "category": "Groceries",
///   "description": "Weekly shop",
///   "date": "2024-04-12"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub account_nr: i32,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
}

impl NewTransaction {
    /// The debit leg of a transfer, taken from `from` on `date`.
    pub fn transfer_debit(from: i32, to: i32, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            account_nr: from,
            amount: -amount,
            category: TRANSFER_CATEGORY.to_string(),
            description: format!("Transferred to account: {to}"),
            date,
        }
    }

    /// The credit leg of a transfer, paid into `to` on `date`.
    pub fn transfer_credit(from: i32, to: i32, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            account_nr: to,
            amount,
            category: TRANSFER_CATEGORY.to_string(),
            description: format!("Transferred from account: {from}"),
            date,
        }
    }

    /// Assign an id, turning this into a storable transaction.
    pub fn into_transaction(self, id: Uuid) -> Transaction {
        Transaction {
            id,
            account_nr: self.account_nr,
            amount: self.amount,
            category: self.category,
            description: self.description,
            date: self.date,
        }
    }
}
