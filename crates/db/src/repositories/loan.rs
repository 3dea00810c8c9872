//! Loan sub-ledger repository.

use chrono::{Days, NaiveDate, Utc};
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::collections::CaseStatus;
use kinko_core::ledger::{Initiator, LedgerError, TransactionRecord, TransferKind, TransferRequest};
use kinko_core::loans::{
    BorrowRequest, Eligibility, LoanError, LoanPaymentKind, LoanPolicy, LoanService, LoanState,
    LoanStatus, PaymentStatus,
};
use kinko_shared::types::{AccountId, LoanId};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use super::account::{find_customer, lock_customer, owned_account};
use super::collections::{CaseSubject, lift_enforcement_if_clear, open_case, resolve_cases};
use super::tax::income_between;
use crate::entities::prelude::*;
use crate::entities::sea_orm_active_enums as db_enums;
use crate::entities::{accounts, loan_payments, loans};
use crate::error::db_err;
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// A reminder owed to a borrower whose autopay keeps failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanNotice {
    /// The loan.
    pub loan_id: Uuid,
    /// Borrower.
    pub owner_identity: String,
    /// Outstanding balance after today's run.
    pub outstanding: Decimal,
    /// First day of the failure streak.
    pub autopay_failed_since: Option<NaiveDate>,
}

/// Summary of one daily maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MaintenanceReport {
    /// Business date of the run.
    pub business_date: Option<NaiveDate>,
    /// Loans that accrued interest.
    pub accrued: usize,
    /// Interest added across all loans.
    pub interest_total: Decimal,
    /// Successful autopay debits.
    pub autopay_succeeded: usize,
    /// Rejected autopay debits.
    pub autopay_failed: usize,
    /// Loans paid off by this run.
    pub resolved: usize,
    /// Reminders due today.
    pub notices: Vec<LoanNotice>,
    /// Loans whose maintenance failed and will be retried next run.
    pub failed: usize,
}

struct LoanRun {
    interest: Option<Decimal>,
    autopay: Option<bool>,
    resolved: bool,
    notice: Option<LoanNotice>,
}

pub(crate) fn to_state(model: &loans::Model) -> LoanState {
    LoanState {
        outstanding: model.outstanding,
        weekly_rate: model.weekly_rate,
        penalty_weekly_rate: model.penalty_weekly_rate,
        autopay_amount: model.autopay_amount,
        status: model.status.into(),
        autopay_failed_since: model.autopay_failed_since,
        last_accrued_on: model.last_accrued_on,
        last_autopay_on: model.last_autopay_on,
    }
}

/// Writes the rule state back to the loan row.
pub(crate) async fn save_state<C: ConnectionTrait>(
    conn: &C,
    model: loans::Model,
    state: &LoanState,
) -> Result<loans::Model, LedgerError> {
    let was_active = LoanStatus::from(model.status) == LoanStatus::Active;
    let mut active = model.into_active_model();
    active.outstanding = Set(state.outstanding);
    active.status = Set(state.status.into());
    active.autopay_failed_since = Set(state.autopay_failed_since);
    active.last_accrued_on = Set(state.last_accrued_on);
    active.last_autopay_on = Set(state.last_autopay_on);
    if was_active && state.status == LoanStatus::Resolved {
        active.resolved_at = Set(Some(Utc::now().into()));
    }
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await.map_err(db_err)
}

/// Appends a payment attempt.
pub(crate) async fn record_payment<C: ConnectionTrait>(
    conn: &C,
    loan_id: Uuid,
    kind: LoanPaymentKind,
    amount: Decimal,
    outcome: Result<Uuid, &LedgerError>,
    business_date: NaiveDate,
) -> Result<loan_payments::Model, LedgerError> {
    let (status, ledger_transaction_id, failure_reason) = match outcome {
        Ok(transaction_id) => (PaymentStatus::Succeeded, Some(transaction_id), None),
        Err(err) => (PaymentStatus::Failed, None, Some(err.to_string())),
    };
    loan_payments::ActiveModel {
        id: Set(Uuid::now_v7()),
        loan_id: Set(loan_id),
        kind: Set(kind.into()),
        status: Set(status.into()),
        amount: Set(amount),
        ledger_transaction_id: Set(ledger_transaction_id),
        failure_reason: Set(failure_reason),
        business_date: Set(business_date),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(db_err)
}

/// Closes the loan's case once its failure streak has cleared or it is paid off.
async fn settle_collections<C: ConnectionTrait>(
    conn: &C,
    loan: &loans::Model,
) -> Result<(), LedgerError> {
    let resolved = LoanStatus::from(loan.status) == LoanStatus::Resolved;
    if (resolved || loan.autopay_failed_since.is_none())
        && resolve_cases(conn, CaseSubject::Loan(loan.id)).await? > 0
    {
        lift_enforcement_if_clear(conn, loan.customer_id).await?;
    }
    Ok(())
}

/// Locks every account of the borrower, the paying account and the reserve
/// in one ascending pass. Runs before the payment transfer, so releasing
/// enforcement afterwards takes no new account locks.
async fn lock_payment_accounts<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    source: &AccountRef,
) -> Result<(), LedgerError> {
    let owned: Vec<Uuid> = Accounts::find()
        .select_only()
        .column(accounts::Column::Id)
        .filter(accounts::Column::CustomerId.eq(customer_id))
        .into_tuple()
        .all(conn)
        .await
        .map_err(db_err)?;
    let source = ledger::resolve(conn, source).await?;
    let reserve = ledger::system_account_id(conn, SystemRole::LoanReserve).await?;
    ledger::lock_accounts(
        conn,
        owned.into_iter().map(AccountId::from_uuid).chain([source, reserve]),
    )
    .await?;
    Ok(())
}

/// Repository for loans.
#[derive(Debug, Clone)]
pub struct LoanRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
    policy: LoanPolicy,
}

impl LoanRepository {
    /// Creates a new loan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings, policy: LoanPolicy) -> Self {
        Self { db, settings, policy }
    }

    /// Lends from the loan reserve. The loan exists only if the principal moved.
    pub async fn borrow(&self, request: &BorrowRequest, today: NaiveDate) -> Result<loans::Model, LoanError> {
        let owner = request.owner_identity.as_str();
        retry::run(&self.settings.retry, "borrow", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = lock_customer(&txn, owner)
                .await?
                .ok_or_else(|| LoanError::CustomerNotFound(owner.to_string()))?;

            let has_active_loan = Loans::find()
                .filter(loans::Column::CustomerId.eq(customer.id))
                .filter(loans::Column::Status.eq(db_enums::LoanStatus::Active))
                .one(&txn)
                .await
                .map_err(db_err)?
                .is_some();
            let window_start =
                today - Days::new(u64::from(self.policy.income_window_days.saturating_sub(1)));
            let eligibility = Eligibility {
                blacklisted: customer.blacklisted_at.is_some(),
                has_active_loan,
                income_in_window: income_between(&txn, customer.id, window_start, today).await?,
            };
            let quote = LoanService::quote(&self.policy, &eligibility, request.principal, request.autopay_amount)?;

            let disbursement = owned_account(&txn, customer.id, &request.disbursement_account).await?;
            let autopay = match &request.autopay_account {
                Some(reference) => owned_account(&txn, customer.id, reference).await?,
                None => disbursement,
            };
            let reserve = ledger::system_account_id(&txn, SystemRole::LoanReserve).await?;
            let transaction = ledger::transfer(
                &txn,
                &TransferRequest {
                    from: AccountRef::id(reserve),
                    to: AccountRef::id(disbursement),
                    amount: quote.principal,
                    currency: self.settings.currency,
                    description: Some("Loan disbursement".to_string()),
                    kind: TransferKind::Transfer,
                    initiator: Initiator::Customer,
                },
            )
            .await?;

            let loan = loans::ActiveModel {
                id: Set(LoanId::new().into_inner()),
                customer_id: Set(customer.id),
                disbursement_account_id: Set(disbursement.into_inner()),
                autopay_account_id: Set(autopay.into_inner()),
                principal: Set(quote.principal),
                outstanding: Set(quote.principal),
                weekly_rate: Set(quote.weekly_rate),
                penalty_weekly_rate: Set(quote.penalty_weekly_rate),
                autopay_amount: Set(quote.autopay_amount),
                status: Set(db_enums::LoanStatus::Active),
                disbursement_transaction_id: Set(transaction.id.into_inner()),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;

            txn.commit().await.map_err(db_err)?;
            tracing::info!(
                loan_id = %loan.id,
                owner_identity = owner,
                principal = %loan.principal,
                weekly_rate = %loan.weekly_rate,
                "disbursed loan"
            );
            Ok::<_, LoanError>(loan)
        })
        .await
        .inspect_err(|e| tracing::warn!(owner_identity = owner, error = %e, "loan rejected"))
    }

    /// Manual repayment, capped at the outstanding balance.
    ///
    /// Pays from `from`, or the loan's autopay account when absent.
    pub async fn repay(
        &self,
        id: LoanId,
        amount: Decimal,
        from: Option<&AccountRef>,
        today: NaiveDate,
    ) -> Result<loans::Model, LoanError> {
        retry::run(&self.settings.retry, "repay_loan", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let loan = Loans::find_by_id(id.into_inner())
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or(LoanError::LoanNotFound(id))?;
            if LoanStatus::from(loan.status) != LoanStatus::Active {
                return Err(LoanError::LoanNotActive(id));
            }

            let state = to_state(&loan);
            let collect = LoanService::repayment_amount(&self.policy, amount, state.outstanding)?;
            let source = from
                .cloned()
                .unwrap_or_else(|| AccountRef::id(AccountId::from_uuid(loan.autopay_account_id)));
            lock_payment_accounts(&txn, loan.customer_id, &source).await?;
            let transaction = self.pay_reserve(&txn, &source, collect, "Loan repayment").await?;
            record_payment(&txn, loan.id, LoanPaymentKind::Manual, collect, Ok(transaction.id.into_inner()), today).await?;

            let state = LoanService::apply_payment(state, collect, LoanPaymentKind::Manual, today);
            let loan = save_state(&txn, loan, &state).await?;
            settle_collections(&txn, &loan).await?;
            txn.commit().await.map_err(db_err)?;

            tracing::info!(loan_id = %id, amount = %collect, outstanding = %loan.outstanding, "loan repaid");
            Ok::<_, LoanError>(loan)
        })
        .await
        .inspect_err(|e| tracing::warn!(loan_id = %id, error = %e, "repayment rejected"))
    }

    /// Daily accrual and autopay for every active loan.
    ///
    /// Each loan is one unit of work and each step is guarded by its
    /// last-run date, so repeating the run on the same day changes nothing.
    pub async fn run_daily_maintenance(&self, today: NaiveDate) -> Result<MaintenanceReport, LoanError> {
        let ids: Vec<Uuid> = Loans::find()
            .select_only()
            .column(loans::Column::Id)
            .filter(loans::Column::Status.eq(db_enums::LoanStatus::Active))
            .order_by_asc(loans::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut report = MaintenanceReport {
            business_date: Some(today),
            ..MaintenanceReport::default()
        };
        for id in ids {
            let run = retry::run(&self.settings.retry, "loan_maintenance", || async move {
                self.maintain(id, today).await
            })
            .await;
            match run {
                Ok(run) => {
                    if let Some(interest) = run.interest {
                        report.accrued += 1;
                        report.interest_total += interest;
                    }
                    match run.autopay {
                        Some(true) => report.autopay_succeeded += 1,
                        Some(false) => report.autopay_failed += 1,
                        None => {}
                    }
                    if run.resolved {
                        report.resolved += 1;
                    }
                    report.notices.extend(run.notice);
                }
                Err(err) => {
                    tracing::error!(loan_id = %id, error = %err, "loan maintenance failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            business_date = %today,
            accrued = report.accrued,
            autopay_succeeded = report.autopay_succeeded,
            autopay_failed = report.autopay_failed,
            notices = report.notices.len(),
            "loan maintenance finished"
        );
        Ok(report)
    }

    async fn maintain(&self, id: Uuid, today: NaiveDate) -> Result<LoanRun, LoanError> {
        let txn = ledger::begin(&self.db, &self.settings).await?;
        let loan = Loans::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(LoanError::LoanNotFound(LoanId::from_uuid(id)))?;

        let mut run = LoanRun {
            interest: None,
            autopay: None,
            resolved: false,
            notice: None,
        };
        let mut state = to_state(&loan);
        if state.status != LoanStatus::Active {
            return Ok(run);
        }

        run.interest = LoanService::accrual_due(&state, today);
        state = LoanService::apply_accrual(state, today);

        if let Some(amount) = LoanService::autopay_due(&state, today) {
            let source = AccountRef::id(AccountId::from_uuid(loan.autopay_account_id));
            lock_payment_accounts(&txn, loan.customer_id, &source).await?;
            let savepoint = txn.begin().await.map_err(db_err)?;
            match self.pay_reserve(&savepoint, &source, amount, "Loan autopay").await {
                Ok(transaction) => {
                    savepoint.commit().await.map_err(db_err)?;
                    record_payment(&txn, id, LoanPaymentKind::Autopay, amount, Ok(transaction.id.into_inner()), today).await?;
                    state = LoanService::apply_payment(state, amount, LoanPaymentKind::Autopay, today);
                    run.autopay = Some(true);
                }
                Err(err) if err.is_retryable() => return Err(err.into()),
                Err(err) => {
                    savepoint.rollback().await.map_err(db_err)?;
                    tracing::warn!(loan_id = %id, amount = %amount, error = %err, "autopay failed");
                    record_payment(&txn, id, LoanPaymentKind::Autopay, amount, Err(&err), today).await?;
                    state = LoanService::apply_autopay_failure(state, today);
                    open_case(
                        &txn,
                        loan.customer_id,
                        CaseSubject::Loan(id),
                        CaseStatus::Overdue,
                        state.autopay_failed_since,
                    )
                    .await?;
                    run.autopay = Some(false);
                }
            }
        }

        let loan = save_state(&txn, loan, &state).await?;
        run.resolved = state.status == LoanStatus::Resolved;
        settle_collections(&txn, &loan).await?;

        if LoanService::notice_due(&state, today) {
            let owner = Customers::find_by_id(loan.customer_id)
                .one(&txn)
                .await
                .map_err(db_err)?
                .map(|c| c.owner_identity)
                .unwrap_or_default();
            run.notice = Some(LoanNotice {
                loan_id: loan.id,
                owner_identity: owner,
                outstanding: loan.outstanding,
                autopay_failed_since: loan.autopay_failed_since,
            });
        }

        txn.commit().await.map_err(db_err)?;
        Ok(run)
    }

    async fn pay_reserve(
        &self,
        txn: &DatabaseTransaction,
        from: &AccountRef,
        amount: Decimal,
        description: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        let reserve = ledger::system_account_id(txn, SystemRole::LoanReserve).await?;
        ledger::transfer(
            txn,
            &TransferRequest {
                from: from.clone(),
                to: AccountRef::id(reserve),
                amount,
                currency: self.settings.currency,
                description: Some(description.to_string()),
                kind: TransferKind::Transfer,
                initiator: Initiator::Customer,
            },
        )
        .await
    }

    /// One loan.
    pub async fn get_loan(&self, id: LoanId) -> Result<loans::Model, LoanError> {
        Loans::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LoanError::LoanNotFound(id))
    }

    /// The customer's active loan, if any.
    pub async fn get_active_loan(&self, owner_identity: &str) -> Result<Option<loans::Model>, LoanError> {
        let customer = find_customer(&self.db, owner_identity)
            .await?
            .ok_or_else(|| LoanError::CustomerNotFound(owner_identity.to_string()))?;
        Ok(Loans::find()
            .filter(loans::Column::CustomerId.eq(customer.id))
            .filter(loans::Column::Status.eq(db_enums::LoanStatus::Active))
            .one(&self.db)
            .await
            .map_err(db_err)?)
    }

    /// Every payment attempt of a loan, newest first.
    pub async fn list_payments(&self, id: LoanId) -> Result<Vec<loan_payments::Model>, LoanError> {
        Ok(LoanPayments::find()
            .filter(loan_payments::Column::LoanId.eq(id.into_inner()))
            .order_by_desc(loan_payments::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?)
    }
}
