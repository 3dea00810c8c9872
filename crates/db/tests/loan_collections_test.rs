//! A loan that stops paying, from the first failed autopay to a full
//! seizure.
//!
//! Sweeps and maintenance runs touch every open case and loan, so this
//! scenario lives in its own test binary. The final repayment races a
//! transfer into the borrower's frozen account.

mod common;

use chrono::{Days, NaiveDate};
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::ledger::{
    AccountStatus, Initiator, LedgerError, MovementRequest, TransferKind, TransferRequest,
};
use kinko_core::loans::{BorrowRequest, LoanError};
use kinko_core::tax::IncomeSource;
use kinko_db::entities::sea_orm_active_enums::{
    CaseKind, CaseStatus, LoanPaymentKind, LoanStatus, PaymentStatus,
};
use kinko_shared::types::{Currency, LoanId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{balance, customer, fund, harness, identity, open_customer, system_account};

fn d0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    d0() + Days::new(offset)
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
async fn test_failed_autopay_escalates_to_seizure_and_clears() {
    let Some(h) = harness().await else { return };
    let reserve = system_account(&h, SystemRole::LoanReserve).await;
    fund(&h, reserve.id, dec!(100000)).await;

    let (owner, account) = open_customer(&h, "borrower").await;
    h.tax
        .record_income(&owner, IncomeSource::Wages, &identity("payroll"), dec!(70000), day(0) - Days::new(1))
        .await
        .expect("income failed");

    let loan = h
        .loans
        .borrow(&borrow_request(&owner, AccountRef::id(account.id), dec!(10000)), d0())
        .await
        .expect("borrow failed");
    let loan_id = LoanId::from_uuid(loan.id);
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.outstanding, dec!(10000));
    assert_eq!(loan.autopay_amount, dec!(1000));
    assert_eq!(balance(&h, account.id).await, dec!(10000));

    let err = h
        .loans
        .borrow(&borrow_request(&owner, AccountRef::id(account.id), dec!(1000)), d0())
        .await
        .expect_err("one active loan at a time");
    assert!(matches!(err, LoanError::ActiveLoanExists), "got {err:?}");

    h.ledger
        .withdraw(&MovementRequest {
            account: AccountRef::id(account.id),
            amount: dec!(10000),
            currency: Currency::Jpy,
            description: Some("spent".to_string()),
            initiator: Initiator::Customer,
        })
        .await
        .expect("withdraw failed");

    // Day 0: autopay bounces and a case opens.
    let report = h.loans.run_daily_maintenance(d0()).await.expect("maintenance failed");
    assert!(report.autopay_failed >= 1);
    assert!(report.notices.iter().any(|n| n.loan_id == loan.id));

    let loan = h.loans.get_loan(loan_id).await.unwrap();
    assert_eq!(loan.autopay_failed_since, Some(d0()));
    assert!(loan.outstanding > dec!(10000), "interest accrued");
    let payments = h.loans.list_payments(loan_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].kind, LoanPaymentKind::Autopay);
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert!(payments[0].failure_reason.is_some());

    let cases = h.collections.list_cases(&owner).await.unwrap();
    assert_eq!(cases.len(), 1);
    let case_id = cases[0].id;
    assert_eq!(cases[0].kind, CaseKind::Loan);
    assert_eq!(cases[0].status, CaseStatus::Overdue);
    assert_eq!(cases[0].overdue_since, Some(d0()));

    // Same-day replay changes nothing.
    h.loans.run_daily_maintenance(d0()).await.unwrap();
    assert_eq!(h.loans.list_payments(loan_id).await.unwrap().len(), 1);
    assert_eq!(h.loans.get_loan(loan_id).await.unwrap().outstanding, loan.outstanding);

    // Day 7: blacklisted.
    h.collections.sweep(day(7)).await.expect("sweep failed");
    let cases = h.collections.list_cases(&owner).await.unwrap();
    assert_eq!(cases[0].status, CaseStatus::Overdue);
    assert!(cases[0].blacklisted);
    assert!(customer(&h, &owner).await.blacklisted_at.is_some());

    // Day 14: partial seizure freezes the account.
    fund(&h, account.id, dec!(3000)).await;
    let report = h.collections.sweep(day(14)).await.expect("sweep failed");
    let seized: Vec<_> = report.seizures.iter().filter(|s| s.case_id == case_id).collect();
    assert_eq!(seized.len(), 1);
    assert_eq!(seized[0].amount, dec!(3000));
    assert_eq!(balance(&h, account.id).await, Decimal::ZERO);

    let frozen = h.accounts.get_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(frozen.status, AccountStatus::Frozen);
    let cases = h.collections.list_cases(&owner).await.unwrap();
    assert_eq!(cases[0].status, CaseStatus::Seizure);
    assert_eq!(h.collections.list_seizures(case_id).await.unwrap().len(), 1);

    let after_seizure = h.loans.get_loan(loan_id).await.unwrap();
    assert_eq!(after_seizure.outstanding, loan.outstanding - dec!(3000));
    assert_eq!(after_seizure.autopay_failed_since, Some(d0()), "seizure keeps the streak");

    let err = h
        .ledger
        .withdraw(&MovementRequest {
            account: AccountRef::id(account.id),
            amount: dec!(1),
            currency: Currency::Jpy,
            description: None,
            initiator: Initiator::Customer,
        })
        .await
        .expect_err("frozen accounts refuse customer debits");
    assert!(matches!(err, LedgerError::AccountNotUsable { .. }), "got {err:?}");

    let err = h
        .loans
        .borrow(&borrow_request(&owner, AccountRef::id(account.id), dec!(1000)), day(14))
        .await
        .expect_err("blacklisted customers cannot borrow");
    assert!(matches!(err, LoanError::Blacklisted), "got {err:?}");

    // Day 15: a relative pays off the rest while sending pocket money to the
    // frozen account; enforcement lifts once the case resolves.
    let (_, relative) = open_customer(&h, "relative").await;
    fund(&h, relative.id, after_seizure.outstanding + dec!(500)).await;
    let payer = AccountRef::id(relative.id);
    let gift_request = TransferRequest {
        from: AccountRef::id(relative.id),
        to: AccountRef::id(account.id),
        amount: dec!(500),
        currency: Currency::Jpy,
        description: Some("pocket money".to_string()),
        kind: TransferKind::Transfer,
        initiator: Initiator::Customer,
    };
    let (repaid, gift) = tokio::join!(
        h.loans.repay(loan_id, dec!(100000), Some(&payer), day(15)),
        h.ledger.transfer(&gift_request),
    );
    let loan = repaid.expect("repayment failed");
    gift.expect("transfer into a frozen account failed");
    assert_eq!(loan.status, LoanStatus::Resolved);
    assert_eq!(loan.outstanding, Decimal::ZERO);
    assert!(loan.resolved_at.is_some());
    assert_eq!(balance(&h, relative.id).await, Decimal::ZERO);

    let cases = h.collections.list_cases(&owner).await.unwrap();
    assert_eq!(cases[0].status, CaseStatus::Resolved);
    assert_eq!(h.collections.list_seizures(case_id).await.unwrap().len(), 1);
    let payments = h.loans.list_payments(loan_id).await.unwrap();
    assert_eq!(payments.iter().filter(|p| p.kind == LoanPaymentKind::Seizure).count(), 1);
    assert!(payments
        .iter()
        .any(|p| p.kind == LoanPaymentKind::Manual && p.amount == after_seizure.outstanding));

    let account = h.accounts.get_by_id(account.id).await.unwrap().unwrap();
    assert_eq!(account.status, AccountStatus::Active);
    assert_eq!(account.balance, dec!(500));
    let borrower = customer(&h, &owner).await;
    assert!(borrower.blacklisted_at.is_none());
    assert!(borrower.blacklist_reason.is_none());
    assert!(h.loans.get_active_loan(&owner).await.unwrap().is_none());
}

#[tokio::test]
async fn test_borrow_needs_income() {
    let Some(h) = harness().await else { return };
    let (owner, account) = open_customer(&h, "no-income").await;
    let err = h
        .loans
        .borrow(&borrow_request(&owner, AccountRef::id(account.id), dec!(1000)), d0())
        .await
        .expect_err("no baseline");
    assert!(matches!(err, LoanError::NoIncomeBaseline), "got {err:?}");
    assert!(h.loans.get_active_loan(&owner).await.unwrap().is_none());
}

#[tokio::test]
async fn test_job_runs_once_per_day() {
    let Some(h) = harness().await else { return };
    let job = identity("job");
    assert!(!h.jobs.already_ran(&job, d0()).await.unwrap());
    assert!(h.jobs.last_run(&job).await.unwrap().is_none());

    h.jobs.record(&job, d0(), json!({ "examined": 3 })).await.unwrap();
    h.jobs.record(&job, d0(), json!({ "examined": 99 })).await.unwrap();
    assert!(h.jobs.already_ran(&job, d0()).await.unwrap());
    assert!(!h.jobs.already_ran(&job, day(1)).await.unwrap());

    let last = h.jobs.last_run(&job).await.unwrap().expect("recorded");
    assert_eq!(last.run_date, d0());
    assert_eq!(last.summary, Some(json!({ "examined": 3 })));
}
