//! PostgreSQL implementation of the storage seam.
//!
//! A unit of work is one database transaction. Account locks are row locks
//! taken with `SELECT ... FOR UPDATE`, which PostgreSQL holds until the
//! transaction commits or rolls back. Dropping an uncommitted
//! [`PgUnitOfWork`] rolls the transaction back when its connection returns
//! to the pool.

use chrono::NaiveDate;
use sqlx::Postgres;
use uuid::Uuid;

use super::{AccountStore, LedgerStore, TransactionStore, UnitOfWork};
use crate::{
    db::DbPool,
    error::AppError,
    models::{account::Account, transaction::Transaction},
};

/// Ledger storage backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LedgerStore for PgStore {
    type Work = PgUnitOfWork;

    async fn begin(&self) -> Result<PgUnitOfWork, AppError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }
}

/// One open PostgreSQL transaction.
pub struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

/// Map a failed account insert, turning a primary key clash into a conflict.
fn account_insert_error(err: sqlx::Error, account_nr: i32) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateAccount(account_nr)
        }
        _ => AppError::Database(err),
    }
}

impl AccountStore for PgUnitOfWork {
    async fn find_by_number(&mut self, account_nr: i32) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_nr, owner_id, balance FROM accounts WHERE account_nr = $1",
        )
        .bind(account_nr)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn find_by_number_with_lock(
        &mut self,
        account_nr: i32,
    ) -> Result<Option<Account>, AppError> {
        // FOR UPDATE blocks other transactions locking or updating this row
        // until ours finishes
        let account = sqlx::query_as::<_, Account>(
            "SELECT account_nr, owner_id, balance FROM accounts WHERE account_nr = $1 FOR UPDATE",
        )
        .bind(account_nr)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn exists_by_number(&mut self, account_nr: i32) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE account_nr = $1)")
                .bind(account_nr)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn find_all_by_owner(&mut self, owner_id: i64) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT account_nr, owner_id, balance FROM accounts WHERE owner_id = $1 ORDER BY account_nr",
        )
        .bind(owner_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(accounts)
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), AppError> {
        let updated = sqlx::query(
            "UPDATE accounts SET owner_id = $2, balance = $3 WHERE account_nr = $1",
        )
        .bind(account.account_nr)
        .bind(account.owner_id)
        .bind(account.balance)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated == 0 {
            sqlx::query("INSERT INTO accounts (account_nr, owner_id, balance) VALUES ($1, $2, $3)")
                .bind(account.account_nr)
                .bind(account.owner_id)
                .bind(account.balance)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| account_insert_error(e, account.account_nr))?;
        }

        Ok(())
    }
}

impl TransactionStore for PgUnitOfWork {
    async fn find_by_id(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, account_nr, amount, category, description, date
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(transaction)
    }

    async fn find_by_account(&mut self, account_nr: i32) -> Result<Vec<Transaction>, AppError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, account_nr, amount, category, description, date
            FROM transactions
            WHERE account_nr = $1
            ORDER BY date, id
            "#,
        )
        .bind(account_nr)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(transactions)
    }

    async fn find_by_account_since(
        &mut self,
        account_nr: i32,
        since: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError> {
        let transactions = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, account_nr, amount, category, description, date
            FROM transactions
            WHERE account_nr = $1 AND date >= $2
            ORDER BY date, id
            "#,
        )
        .bind(account_nr)
        .bind(since)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(transactions)
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_nr, amount, category, description, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.account_nr)
        .bind(transaction.amount)
        .bind(&transaction.category)
        .bind(&transaction.description)
        .bind(transaction.date)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }
}

impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
