//! Integration tests for database triggers.
//!
//! These tests verify that PostgreSQL enforces ledger integrity at the
//! database level, even if application logic fails.

mod common;

use kinko_db::entities::{
    sea_orm_active_enums::{AccountStatus, EntryType, TransactionStatus, TransactionType},
    accounts, transaction_entries, transactions,
};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, EntityTrait, IntoActiveModel, TransactionTrait,
};
use uuid::Uuid;

use common::{fund, harness, open_customer};

#[tokio::test]
async fn test_unbalanced_transaction_rejected_at_commit() {
    let Some(h) = harness().await else { return };
    let (_, alice) = open_customer(&h, "alice").await;
    let (_, bob) = open_customer(&h, "bob").await;

    let txn = h.db.begin().await.expect("begin failed");
    let id = Uuid::now_v7();
    transactions::ActiveModel {
        id: Set(id),
        transaction_type: Set(TransactionType::Transfer),
        status: Set(TransactionStatus::Completed),
        from_account_id: Set(Some(alice.id.into_inner())),
        to_account_id: Set(Some(bob.id.into_inner())),
        amount: Set(dec!(100)),
        currency: Set("JPY".to_string()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .expect("header insert failed");

    // A debit with no matching credit.
    transaction_entries::ActiveModel {
        id: Set(Uuid::now_v7()),
        transaction_id: Set(id),
        account_id: Set(alice.id.into_inner()),
        entry_type: Set(EntryType::Debit),
        amount: Set(dec!(100)),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .expect("entry insert failed");

    let result = txn.commit().await;
    assert!(result.is_err(), "commit of a one-legged transfer must fail");
}

#[tokio::test]
async fn test_completed_transaction_is_immutable() {
    let Some(h) = harness().await else { return };
    let (_, alice) = open_customer(&h, "alice").await;
    fund(&h, alice.id, dec!(500)).await;

    let history = h
        .ledger
        .get_transaction_history(&kinko_core::account::AccountRef::id(alice.id), None)
        .await
        .expect("history failed");
    let id = history[0].transaction_id.into_inner();
    let row = transactions::Entity::find_by_id(id)
        .one(&h.db)
        .await
        .expect("query failed")
        .expect("transaction exists");

    let mut tampered = row.into_active_model();
    tampered.amount = Set(dec!(5000));
    let result = tampered.update(&h.db).await;
    assert!(result.is_err(), "amount of a completed transaction must not change");

    let entry = transaction_entries::Entity::find()
        .one(&h.db)
        .await
        .expect("query failed")
        .expect("an entry exists");
    let mut tampered = entry.into_active_model();
    tampered.amount = Set(dec!(1));
    let result = tampered.update(&h.db).await;
    assert!(result.is_err(), "entries must be immutable");
}

#[tokio::test]
async fn test_closed_account_cannot_reopen() {
    let Some(h) = harness().await else { return };
    let (_, alice) = open_customer(&h, "alice").await;
    h.accounts.close_account(alice.id).await.expect("close failed");

    let row = accounts::Entity::find_by_id(alice.id.into_inner())
        .one(&h.db)
        .await
        .expect("query failed")
        .expect("account exists");
    let mut reopened = row.into_active_model();
    reopened.status = Set(AccountStatus::Active);
    let result = reopened.update(&h.db).await;
    assert!(result.is_err(), "closed is terminal");
}

#[tokio::test]
async fn test_non_positive_amount_rejected() {
    let Some(h) = harness().await else { return };
    let (_, alice) = open_customer(&h, "alice").await;

    let result = transactions::ActiveModel {
        id: Set(Uuid::now_v7()),
        transaction_type: Set(TransactionType::Deposit),
        status: Set(TransactionStatus::Completed),
        from_account_id: Set(None),
        to_account_id: Set(Some(alice.id.into_inner())),
        amount: Set(dec!(0)),
        currency: Set("JPY".to_string()),
        ..Default::default()
    }
    .insert(&h.db)
    .await;
    assert!(result.is_err(), "zero-amount transactions must be rejected");
}
