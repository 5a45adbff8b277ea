//! In-process implementation of the storage seam.
//!
//! Committed state lives behind one mutex. Each account number has its own
//! async mutex in a lock registry; a unit of work keeps the guards it took
//! until it is committed or dropped, so units of work touching different
//! accounts never wait on each other. A registry entry is removed when the
//! last unit of work holding or waiting on it lets go.
//!
//! Writes are staged inside the unit of work and applied to the committed
//! state in one step on commit. Dropping the unit of work discards them.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{AccountStore, LedgerStore, TransactionStore, UnitOfWork};
use crate::{
    error::AppError,
    models::{account::Account, transaction::Transaction},
};

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<i32, Account>,
    transactions: HashMap<Uuid, Transaction>,
    by_account: HashMap<i32, Vec<Uuid>>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    locks: Mutex<HashMap<i32, Arc<AsyncMutex<()>>>>,
}

impl Shared {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables.lock().map_err(|_| AppError::StoreLock)
    }

    fn account_lock(&self, account_nr: i32) -> Result<Arc<AsyncMutex<()>>, AppError> {
        let mut locks = self.locks.lock().map_err(|_| AppError::StoreLock)?;
        Ok(locks
            .entry(account_nr)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone())
    }

    fn release_locks(&self, held: &mut HashMap<i32, OwnedMutexGuard<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            held.clear();
            return;
        };
        // Clones are only taken under `locks`, so a count of one here means
        // nobody else holds or waits on the entry
        for (account_nr, guard) in held.drain() {
            drop(guard);
            if locks
                .get(&account_nr)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(&account_nr);
            }
        }
    }
}

/// Ledger storage kept entirely in memory.
///
/// Cloning is cheap; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    type Work = MemoryUnitOfWork;

    async fn begin(&self) -> Result<MemoryUnitOfWork, AppError> {
        Ok(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            held: HashMap::new(),
            staged_accounts: BTreeMap::new(),
            inserted_accounts: HashSet::new(),
            staged_transactions: Vec::new(),
        })
    }
}

/// Staged writes and held account locks of one unit of work.
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    held: HashMap<i32, OwnedMutexGuard<()>>,
    staged_accounts: BTreeMap<i32, Account>,
    // Numbers that did not exist when first saved here
    inserted_accounts: HashSet<i32>,
    staged_transactions: Vec<Transaction>,
}

impl MemoryUnitOfWork {
    fn lookup(&self, account_nr: i32) -> Result<Option<Account>, AppError> {
        if let Some(account) = self.staged_accounts.get(&account_nr) {
            return Ok(Some(account.clone()));
        }
        Ok(self.shared.tables()?.accounts.get(&account_nr).cloned())
    }

    fn collect_transactions<F>(&self, account_nr: i32, keep: F) -> Result<Vec<Transaction>, AppError>
    where
        F: Fn(&Transaction) -> bool,
    {
        let mut found: Vec<Transaction> = {
            let tables = self.shared.tables()?;
            tables
                .by_account
                .get(&account_nr)
                .into_iter()
                .flatten()
                .filter_map(|id| tables.transactions.get(id))
                .filter(|&t| keep(t))
                .cloned()
                .collect()
        };
        found.extend(
            self.staged_transactions
                .iter()
                .filter(|&t| t.account_nr == account_nr && keep(t))
                .cloned(),
        );
        found.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

        Ok(found)
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        self.shared.release_locks(&mut self.held);
    }
}

impl AccountStore for MemoryUnitOfWork {
    async fn find_by_number(&mut self, account_nr: i32) -> Result<Option<Account>, AppError> {
        self.lookup(account_nr)
    }

    async fn find_by_number_with_lock(
        &mut self,
        account_nr: i32,
    ) -> Result<Option<Account>, AppError> {
        if !self.held.contains_key(&account_nr) {
            let lock = self.shared.account_lock(account_nr)?;
            let guard = lock.lock_owned().await;
            self.held.insert(account_nr, guard);
        }

        self.lookup(account_nr)
    }

    async fn exists_by_number(&mut self, account_nr: i32) -> Result<bool, AppError> {
        Ok(self.lookup(account_nr)?.is_some())
    }

    async fn find_all_by_owner(&mut self, owner_id: i64) -> Result<Vec<Account>, AppError> {
        let mut found: BTreeMap<i32, Account> = self
            .shared
            .tables()?
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id)
            .map(|a| (a.account_nr, a.clone()))
            .collect();

        for (account_nr, account) in &self.staged_accounts {
            if account.owner_id == owner_id {
                found.insert(*account_nr, account.clone());
            } else {
                found.remove(account_nr);
            }
        }

        Ok(found.into_values().collect())
    }

    async fn save_account(&mut self, account: &Account) -> Result<(), AppError> {
        if self.lookup(account.account_nr)?.is_none() {
            self.inserted_accounts.insert(account.account_nr);
        }
        self.staged_accounts
            .insert(account.account_nr, account.clone());

        Ok(())
    }
}

impl TransactionStore for MemoryUnitOfWork {
    async fn find_by_id(&mut self, id: Uuid) -> Result<Option<Transaction>, AppError> {
        if let Some(staged) = self.staged_transactions.iter().find(|t| t.id == id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.shared.tables()?.transactions.get(&id).cloned())
    }

    async fn find_by_account(&mut self, account_nr: i32) -> Result<Vec<Transaction>, AppError> {
        self.collect_transactions(account_nr, |_| true)
    }

    async fn find_by_account_since(
        &mut self,
        account_nr: i32,
        since: NaiveDate,
    ) -> Result<Vec<Transaction>, AppError> {
        self.collect_transactions(account_nr, |t| t.date >= since)
    }

    async fn save_transaction(&mut self, transaction: &Transaction) -> Result<(), AppError> {
        // Same guarantee as the foreign key on the SQL side
        if self.lookup(transaction.account_nr)?.is_none() {
            return Err(AppError::AccountNotFound(transaction.account_nr));
        }
        self.staged_transactions.push(transaction.clone());

        Ok(())
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self) -> Result<(), AppError> {
        let mut tables = self.shared.tables()?;

        if let Some(taken) = self
            .inserted_accounts
            .iter()
            .find(|nr| tables.accounts.contains_key(*nr))
        {
            return Err(AppError::DuplicateAccount(*taken));
        }

        tables.accounts.append(&mut self.staged_accounts);
        for transaction in self.staged_transactions.drain(..) {
            tables
                .by_account
                .entry(transaction.account_nr)
                .or_default()
                .push(transaction.id);
            tables.transactions.insert(transaction.id, transaction);
        }

        // Account locks in `self.held` are released after the writes above
        // are visible
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        Ok(())
    }
}
