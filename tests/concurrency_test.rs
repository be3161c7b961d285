mod common;

use common::seeded_platform;
use creditline::application::ledger::CreditLedger;
use creditline::domain::account::{AccountId, Principal};
use creditline::domain::capability::Capability;
use creditline::domain::generation::{GenerationRequest, GenerationStatus};
use creditline::domain::ledger::EntryKind;
use creditline::error::BillingError;
use creditline::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinSet;

const CONTENDERS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_of_full_balance_succeed_once() {
    let ledger = CreditLedger::new(Arc::new(InMemoryLedgerStore::new()));
    ledger
        .credit(AccountId(1), 100, EntryKind::Bonus, "seed", Decimal::ZERO, None)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..CONTENDERS {
        let ledger = ledger.clone();
        tasks.spawn(async move { ledger.debit(AccountId(1), 100, &format!("contender {i}")).await });
    }

    let mut successes = 0;
    let mut rejections = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(BillingError::InsufficientBalance { required: 100, .. }) => rejections += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(rejections, CONTENDERS - 1);
    assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), 0);
    assert!(ledger.audit(AccountId(1)).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_partial_debits_never_overdraw() {
    let ledger = CreditLedger::new(Arc::new(InMemoryLedgerStore::new()));
    ledger
        .credit(AccountId(7), 1000, EntryKind::Bonus, "seed", Decimal::ZERO, None)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..50 {
        let ledger = ledger.clone();
        tasks.spawn(async move { ledger.debit(AccountId(7), 30, "usage").await.is_ok() });
    }
    let mut successes = 0u64;
    while let Some(ok) = tasks.join_next().await {
        if ok.unwrap() {
            successes += 1;
        }
    }

    // 1000 / 30 = 33 debits fit
    assert_eq!(successes, 33);
    assert_eq!(ledger.balance(AccountId(7)).await.unwrap(), 10);

    let history = ledger.history(AccountId(7)).await.unwrap();
    assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
    assert!(ledger.audit(AccountId(7)).await.unwrap().is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases_charge_balance_once() {
    let platform = seeded_platform().await;
    platform
        .ledger
        .credit(AccountId(1), 100, EntryKind::Bonus, "seed", Decimal::ZERO, None)
        .await
        .unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..8 {
        let purchases = platform.purchases.clone();
        tasks.spawn(async move {
            let buyer = Principal::new(AccountId(1), false);
            purchases
                .purchase_generation(
                    &buyer,
                    GenerationRequest::new(Capability::StaticImage, format!("race {i}")),
                )
                .await
        });
    }

    let mut successes = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(receipt) => {
                assert_eq!(receipt.balance, 0);
                successes += 1;
            }
            Err(BillingError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(platform.ledger.balance(AccountId(1)).await.unwrap(), 0);

    let buyer = Principal::new(AccountId(1), false);
    let generations = platform.purchases.generations(&buyer, 0, 100).await.unwrap();
    let completed = generations
        .iter()
        .filter(|g| g.status == GenerationStatus::Completed)
        .count();
    assert_eq!(completed, 1);
    assert!(
        generations
            .iter()
            .all(|g| matches!(g.status, GenerationStatus::Completed | GenerationStatus::Failed))
    );
}
