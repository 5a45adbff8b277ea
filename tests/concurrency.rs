//! Concurrent posting against the in-memory store.

use std::{sync::Arc, time::Duration};

use chrono::Local;
use rust_decimal::Decimal;
use sparesti_ledger::{
    LedgerService, MemoryStore, NewAccount, NewTransaction,
    store::{AccountStore, LedgerStore},
};

async fn ledger_with_accounts(numbers: &[i32]) -> (Arc<LedgerService<MemoryStore>>, MemoryStore) {
    let store = MemoryStore::new();
    let ledger = LedgerService::new(store.clone());
    for &account_nr in numbers {
        ledger
            .create_account(NewAccount {
                account_nr,
                owner_id: 1,
            })
            .await
            .unwrap();
    }
    (Arc::new(ledger), store)
}

fn deposit(account_nr: i32, amount: Decimal) -> NewTransaction {
    NewTransaction {
        account_nr,
        amount,
        category: "Savings".to_string(),
        description: "Round-up".to_string(),
        date: Local::now().date_naive(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_posts_to_one_account_lose_no_updates() {
    let (ledger, _) = ledger_with_accounts(&[1]).await;
    let amount = Decimal::new(125, 2);
    let callers = 200;

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move { ledger.add_transaction(deposit(1, amount)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let account = ledger.get_account_details(1).await.unwrap();
    assert_eq!(account.balance, amount * Decimal::from(callers));
    assert_eq!(
        ledger.get_transactions_by_account_nr(1).await.unwrap().len(),
        callers as usize
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn locked_account_does_not_block_other_accounts() {
    let (ledger, store) = ledger_with_accounts(&[1, 2]).await;

    let mut holder = store.begin().await.unwrap();
    holder.find_by_number_with_lock(1).await.unwrap();

    let other = tokio::time::timeout(
        Duration::from_secs(1),
        ledger.add_transaction(deposit(2, Decimal::ONE)),
    )
    .await;
    assert!(matches!(other, Ok(Ok(_))));

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        ledger.add_transaction(deposit(1, Decimal::ONE)),
    )
    .await;
    assert!(blocked.is_err());

    drop(holder);
    ledger.add_transaction(deposit(1, Decimal::ONE)).await.unwrap();
    assert_eq!(
        ledger.get_account_details(1).await.unwrap().balance,
        Decimal::ONE
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_complete_and_conserve_money() {
    let (ledger, _) = ledger_with_accounts(&[1, 2]).await;
    ledger
        .add_transaction(deposit(1, Decimal::from(1000)))
        .await
        .unwrap();
    ledger
        .add_transaction(deposit(2, Decimal::from(1000)))
        .await
        .unwrap();

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let (from, to) = if i % 2 == 0 { (1, 2) } else { (2, 1) };
            tokio::spawn(async move { ledger.transfer_money(from, to, Decimal::from(3)).await })
        })
        .collect();
    let all = tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    })
    .await;
    assert!(all.is_ok(), "transfers deadlocked");

    let one = ledger.get_account_details(1).await.unwrap().balance;
    let two = ledger.get_account_details(2).await.unwrap().balance;
    assert_eq!(one, Decimal::from(1000));
    assert_eq!(two, Decimal::from(1000));
    assert_eq!(
        ledger.get_transactions_by_account_nr(1).await.unwrap().len(),
        101
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creation_of_same_number_admits_one() {
    let (ledger, _) = ledger_with_accounts(&[]).await;

    let handles: Vec<_> = (0..20)
        .map(|owner_id| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger
                    .create_account(NewAccount {
                        account_nr: 77,
                        owner_id,
                    })
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            created += 1;
        }
    }

    assert_eq!(created, 1);
}
