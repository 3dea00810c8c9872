//! Manual loan repayment.
//!
//! Kept apart from the autopay scenario, whose maintenance runs would
//! otherwise collect from this borrower.

mod common;

use chrono::NaiveDate;
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::loans::{BorrowRequest, LoanError};
use kinko_core::tax::IncomeSource;
use kinko_db::entities::sea_orm_active_enums::{LoanPaymentKind, LoanStatus, PaymentStatus};
use kinko_shared::types::LoanId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{balance, fund, harness, identity, open_customer, system_account};

fn d0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn borrow_request(owner: &str, account: AccountRef, principal: Decimal) -> BorrowRequest {
    BorrowRequest {
        owner_identity: owner.to_string(),
        principal,
        disbursement_account: account,
        autopay_account: None,
        autopay_amount: None,
    }
}

#[tokio::test]
async fn test_manual_repayment_resolves_the_loan() {
    let Some(h) = harness().await else { return };
    let reserve = system_account(&h, SystemRole::LoanReserve).await;
    fund(&h, reserve.id, dec!(10000)).await;

    let (owner, account) = open_customer(&h, "repayer").await;
    h.tax
        .record_income(&owner, IncomeSource::Wages, &identity("payroll"), dec!(28000), d0())
        .await
        .unwrap();
    let loan = h
        .loans
        .borrow(&borrow_request(&owner, AccountRef::id(account.id), dec!(2000)), d0())
        .await
        .expect("borrow failed");
    let loan_id = LoanId::from_uuid(loan.id);

    let err = h
        .loans
        .repay(loan_id, dec!(500), None, d0())
        .await
        .expect_err("repayments come in whole units");
    assert!(matches!(err, LoanError::InvalidRepayment(_)), "got {err:?}");

    let loan = h.loans.repay(loan_id, dec!(1000), None, d0()).await.expect("repay failed");
    assert_eq!(loan.outstanding, dec!(1000));
    assert_eq!(balance(&h, account.id).await, dec!(1000));

    let loan = h.loans.repay(loan_id, dec!(5000), None, d0()).await.expect("repay failed");
    assert_eq!(loan.status, LoanStatus::Resolved);
    assert_eq!(loan.outstanding, Decimal::ZERO);
    assert_eq!(balance(&h, account.id).await, Decimal::ZERO);

    let err = h
        .loans
        .repay(loan_id, dec!(1000), None, d0())
        .await
        .expect_err("resolved loans take no payments");
    assert!(matches!(err, LoanError::LoanNotActive(_)), "got {err:?}");

    let payments = h.loans.list_payments(loan_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert!(payments
        .iter()
        .all(|p| p.kind == LoanPaymentKind::Manual && p.status == PaymentStatus::Succeeded));
    assert!(payments.iter().any(|p| p.amount == dec!(1000) && p.ledger_transaction_id.is_some()));
}
