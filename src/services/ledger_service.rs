//! Ledger service - core business logic for accounts and their transactions.
//!
//! This service handles:
//! - Opening accounts
//! - Posting transactions under a per-account lock
//! - Two-leg transfers between accounts
//! - Transaction history queries
//!
//! # Atomicity Guarantees
//!
//! Every operation runs inside one unit of work of the underlying store.
//! Posting a transaction updates the balance and records the transaction in
//! the same unit of work, and a transfer posts both legs in a single one, so
//! a failure on the second leg also undoes the first.

use chrono::{Days, Local, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, NewAccount},
        transaction::{NewTransaction, Transaction, check_amount},
    },
    store::{AccountStore, LedgerStore, TransactionStore, UnitOfWork},
};

/// Number of days before today that still count as recent. The boundary day
/// itself is included.
pub const RECENT_WINDOW_DAYS: u64 = 30;

/// Balance and history operations over a [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    store: S,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Open a new account with a zero balance.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: account number is zero or negative
    /// - `DuplicateAccount`: account number is already taken
    pub async fn create_account(&self, request: NewAccount) -> Result<Account, AppError> {
        if request.account_nr <= 0 {
            return Err(AppError::InvalidRequest(
                "Account number must be positive".to_string(),
            ));
        }

        let mut work = self.store.begin().await?;

        // Holding the lock on the number serialises concurrent creations of it
        if work
            .find_by_number_with_lock(request.account_nr)
            .await?
            .is_some()
        {
            work.rollback().await?;
            tracing::warn!("Account number {} already exists", request.account_nr);
            return Err(AppError::DuplicateAccount(request.account_nr));
        }

        let account = Account::open(request.account_nr, request.owner_id);
        work.save_account(&account).await?;
        work.commit().await?;

        tracing::info!(
            "Opened account {} for user {}",
            account.account_nr,
            account.owner_id
        );
        Ok(account)
    }

    /// Get a snapshot of one account.
    pub async fn get_account_details(&self, account_nr: i32) -> Result<Account, AppError> {
        let mut work = self.store.begin().await?;
        let account = find_account(&mut work, account_nr).await?;
        work.commit().await?;

        Ok(account)
    }

    /// All accounts owned by a user, ordered by account number.
    pub async fn get_user_accounts(&self, owner_id: i64) -> Result<Vec<Account>, AppError> {
        let mut work = self.store.begin().await?;
        let accounts = work.find_all_by_owner(owner_id).await?;
        work.commit().await?;

        Ok(accounts)
    }

    /// Post a transaction to its account.
    ///
    /// # Process
    ///
    /// 1. Start a unit of work
    /// 2. Lock the account and read its balance
    /// 3. Apply the amount and record the transaction
    /// 4. Commit (or roll back on error)
    ///
    /// Callers posting to the same account are serialised by the lock in step
    /// 2; callers posting to different accounts do not wait on each other.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: category is blank, the amount doesn't fit the
    ///   stored precision, or the new balance would be out of range
    /// - `AccountNotFound`: account doesn't exist
    pub async fn add_transaction(&self, request: NewTransaction) -> Result<Transaction, AppError> {
        if request.category.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "Transaction category cannot be empty".to_string(),
            ));
        }
        check_amount(request.amount)?;

        let mut work = self.store.begin().await?;
        let transaction = post_transaction(&mut work, request).await?;
        work.commit().await?;

        Ok(transaction)
    }

    /// Move `amount` from one account to another as two transactions.
    ///
    /// The debit leg is posted to `from_account_nr` and the credit leg to
    /// `to_account_nr`, both in the category "Transfer" and dated today.
    /// Both accounts are locked in ascending account-number order before
    /// either leg is posted, so two opposing transfers cannot deadlock.
    ///
    /// Returns the debit and credit legs, in that order.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: amount is negative or doesn't fit the stored
    ///   precision, or either balance would go out of range; nothing is posted
    /// - `AccountNotFound`: either account doesn't exist; nothing is posted
    pub async fn transfer_money(
        &self,
        from_account_nr: i32,
        to_account_nr: i32,
        amount: Decimal,
    ) -> Result<(Transaction, Transaction), AppError> {
        if amount < Decimal::ZERO {
            tracing::warn!(
                "Rejected transfer of {} from {} to {}",
                amount,
                from_account_nr,
                to_account_nr
            );
            return Err(AppError::InvalidRequest(
                "Cannot transfer a negative amount".to_string(),
            ));
        }
        check_amount(amount)?;

        let today = Local::now().date_naive();
        let mut work = self.store.begin().await?;

        let (first, second) = if from_account_nr <= to_account_nr {
            (from_account_nr, to_account_nr)
        } else {
            (to_account_nr, from_account_nr)
        };
        work.find_by_number_with_lock(first).await?;
        work.find_by_number_with_lock(second).await?;

        // An error from either leg drops `work`, which rolls both back
        let debit = post_transaction(
            &mut work,
            NewTransaction::transfer_debit(from_account_nr, to_account_nr, amount, today),
        )
        .await?;
        let credit = post_transaction(
            &mut work,
            NewTransaction::transfer_credit(from_account_nr, to_account_nr, amount, today),
        )
        .await?;

        work.commit().await?;

        tracing::info!(
            "Transferred {} from account {} to account {}",
            amount,
            from_account_nr,
            to_account_nr
        );
        Ok((debit, credit))
    }

    /// Transactions of an account dated within the last
    /// [`RECENT_WINDOW_DAYS`] days, judged by today's local date.
    pub async fn get_recent_transactions_by_account_nr(
        &self,
        account_nr: i32,
    ) -> Result<Vec<Transaction>, AppError> {
        self.get_recent_transactions_as_of(account_nr, Local::now().date_naive())
            .await
    }

    /// Transactions of an account dated from `today` minus
    /// [`RECENT_WINDOW_DAYS`] onwards.
    pub async fn get_recent_transactions_as_of(
        &self,
        account_nr: i32,
        today: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError> {
        let since = today
            .checked_sub_days(Days::new(RECENT_WINDOW_DAYS))
            .unwrap_or(NaiveDate::MIN);

        let mut work = self.store.begin().await?;
        find_account(&mut work, account_nr).await?;
        let transactions = work.find_by_account_since(account_nr, since).await?;
        work.commit().await?;

        Ok(transactions)
    }

    /// Every transaction ever posted to an account.
    pub async fn get_transactions_by_account_nr(
        &self,
        account_nr: i32,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut work = self.store.begin().await?;
        find_account(&mut work, account_nr).await?;
        let transactions = work.find_by_account(account_nr).await?;
        work.commit().await?;

        Ok(transactions)
    }

    /// Every transaction across all accounts a user owns, grouped by account.
    pub async fn get_transactions_by_user_id(
        &self,
        owner_id: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        let mut work = self.store.begin().await?;
        let mut transactions = Vec::new();
        for account in work.find_all_by_owner(owner_id).await? {
            transactions.extend(work.find_by_account(account.account_nr).await?);
        }
        work.commit().await?;

        Ok(transactions)
    }

    /// Get transaction by ID.
    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, AppError> {
        let mut work = self.store.begin().await?;
        let transaction = work
            .find_by_id(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))?;
        work.commit().await?;

        Ok(transaction)
    }

    /// Whether a user may use an account number.
    ///
    /// Numbers nobody has claimed yet are open to everyone, so `true` does
    /// not mean the account exists. Use [`Self::account_exists`] for that.
    pub async fn user_has_access_to_account(
        &self,
        account_nr: i32,
        owner_id: i64,
    ) -> Result<bool, AppError> {
        let mut work = self.store.begin().await?;
        let account = work.find_by_number(account_nr).await?;
        work.commit().await?;

        Ok(account.is_none_or(|a| a.owner_id == owner_id))
    }

    /// Whether an account with this number has been opened.
    pub async fn account_exists(&self, account_nr: i32) -> Result<bool, AppError> {
        let mut work = self.store.begin().await?;
        let exists = work.exists_by_number(account_nr).await?;
        work.commit().await?;

        Ok(exists)
    }
}

async fn find_account<W: UnitOfWork>(work: &mut W, account_nr: i32) -> Result<Account, AppError> {
    work.find_by_number(account_nr)
        .await?
        .ok_or(AppError::AccountNotFound(account_nr))
}

/// Lock the target account, apply the amount and record the transaction,
/// all inside `work`. Nothing is durable until `work` commits.
async fn post_transaction<W: UnitOfWork>(
    work: &mut W,
    request: NewTransaction,
) -> Result<Transaction, AppError> {
    let mut account = work
        .find_by_number_with_lock(request.account_nr)
        .await?
        .ok_or(AppError::AccountNotFound(request.account_nr))?;

    account.alter_balance(request.amount)?;
    work.save_account(&account).await?;

    let transaction = request.into_transaction(Uuid::new_v4());
    work.save_transaction(&transaction).await?;

    tracing::debug!(
        "Posted {} to account {}, balance now {}",
        transaction.amount,
        account.account_nr,
        account.balance
    );
    Ok(transaction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_transaction(account_nr: i32, amount: Decimal, date: NaiveDate) -> NewTransaction {
        NewTransaction {
            account_nr,
            amount,
            category: "Groceries".to_string(),
            description: "Corner shop".to_string(),
            date,
        }
    }

    async fn ledger_with_accounts(numbers: &[i32]) -> LedgerService<MemoryStore> {
        let ledger = LedgerService::new(MemoryStore::new());
        for &account_nr in numbers {
            ledger
                .create_account(NewAccount {
                    account_nr,
                    owner_id: 1,
                })
                .await
                .unwrap();
        }
        ledger
    }

    #[tokio::test]
    async fn rejects_non_positive_account_number() {
        let ledger = LedgerService::new(MemoryStore::new());

        let result = ledger
            .create_account(NewAccount {
                account_nr: 0,
                owner_id: 1,
            })
            .await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(!ledger.account_exists(0).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_blank_category() {
        let ledger = ledger_with_accounts(&[1]).await;
        let mut request = new_transaction(1, Decimal::ONE, Local::now().date_naive());
        request.category = "  ".to_string();

        let result = ledger.add_transaction(request).await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(ledger.get_transactions_by_account_nr(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn posting_returns_stored_transaction() {
        let ledger = ledger_with_accounts(&[1]).await;
        let date = NaiveDate::from_ymd_opt(2024, 4, 12).unwrap();

        let posted = ledger
            .add_transaction(new_transaction(1, Decimal::new(1999, 2), date))
            .await
            .unwrap();

        assert_eq!(ledger.get_transaction(posted.id).await.unwrap(), posted);
        assert_eq!(posted.date, date);
    }

    #[tokio::test]
    async fn unknown_transaction_id_is_not_found() {
        let ledger = ledger_with_accounts(&[]).await;
        let id = Uuid::new_v4();

        let result = ledger.get_transaction(id).await;

        assert!(matches!(result, Err(AppError::TransactionNotFound(found)) if found == id));
    }

    #[tokio::test]
    async fn zero_transfer_posts_two_empty_legs() {
        let ledger = ledger_with_accounts(&[1, 2]).await;

        let (debit, credit) = ledger.transfer_money(1, 2, Decimal::ZERO).await.unwrap();

        assert!(debit.amount.is_zero());
        assert!(credit.amount.is_zero());
        assert_eq!(ledger.get_transactions_by_account_nr(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_source_account_posts_nothing() {
        let ledger = ledger_with_accounts(&[2]).await;

        let result = ledger.transfer_money(1, 2, Decimal::TEN).await;

        assert!(matches!(result, Err(AppError::AccountNotFound(1))));
        assert!(ledger.get_transactions_by_account_nr(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn over_precise_transfer_is_rejected() {
        let ledger = ledger_with_accounts(&[1, 2]).await;

        let result = ledger.transfer_money(1, 2, Decimal::new(1, 5)).await;

        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(ledger.get_transactions_by_account_nr(1).await.unwrap().is_empty());
        assert!(ledger.get_transactions_by_account_nr(2).await.unwrap().is_empty());
    }
}
