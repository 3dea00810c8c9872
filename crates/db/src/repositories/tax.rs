//! Tax sub-ledger repository: income events, weekly assessments, payments.

use chrono::{NaiveDate, Utc};
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::collections::CaseStatus;
use kinko_core::ledger::{Initiator, LedgerError, TransactionRecord, TransferKind, TransferRequest};
use kinko_core::tax::{AssessmentPeriod, IncomeSource, IncomeTotals, TaxError, TaxPolicy, TaxService};
use kinko_shared::types::{AccountId, AssessmentId};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use super::account::{find_customer, lock_customer, owned_account};
use super::collections::{CaseSubject, lift_enforcement_if_clear, open_case, resolve_cases};
use crate::entities::prelude::*;
use crate::entities::sea_orm_active_enums::{self as db_enums, TaxAssessmentStatus};
use crate::entities::{customers, tax_assessments, tax_income_events};
use crate::error::db_err;
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// Result of recording an income event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedIncome {
    /// The stored event (the earlier one for a duplicate).
    pub event: tax_income_events::Model,
    /// True if the event had been recorded before and nothing changed.
    pub duplicate: bool,
}

/// Summary of one weekly assessment run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AssessmentRunReport {
    /// Assessed period.
    pub period_start: Option<NaiveDate>,
    /// Assessed period.
    pub period_end: Option<NaiveDate>,
    /// Assessments created by this run.
    pub assessed: usize,
    /// Customers already assessed for the period.
    pub already_assessed: usize,
    /// Assessments paid from the tax source account.
    pub paid_automatically: usize,
    /// Assessments left for collections.
    pub unpaid: usize,
    /// Customers whose assessment failed and will be retried next run.
    pub failed: usize,
}

enum Assessed {
    Skipped,
    Created { paid: bool },
}

/// Inserts an income event unless `(source, source_id)` exists.
///
/// Returns `None` for a duplicate.
pub(crate) async fn record_income_in<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    source: IncomeSource,
    source_id: &str,
    gross: Decimal,
    occurred_on: NaiveDate,
) -> Result<Option<tax_income_events::Model>, TaxError> {
    if source_id.trim().is_empty() {
        return Err(TaxError::InvalidSourceId);
    }
    let taxable = TaxService::taxable_amount(source, gross)?;
    let id = Uuid::now_v7();

    let inserted = TaxIncomeEvents::insert(tax_income_events::ActiveModel {
        id: Set(id),
        customer_id: Set(customer_id),
        source_type: Set(source.into()),
        source_id: Set(source_id.to_string()),
        gross_amount: Set(gross),
        taxable_amount: Set(taxable),
        occurred_on: Set(occurred_on),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::columns([
            tax_income_events::Column::SourceType,
            tax_income_events::Column::SourceId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await
    .map_err(db_err)?;

    if inserted == 0 {
        tracing::debug!(source = source.as_str(), source_id, "income event already recorded");
        return Ok(None);
    }
    let event = TaxIncomeEvents::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| LedgerError::Internal(format!("income event {id} vanished")))?;
    tracing::info!(
        customer_id = %customer_id,
        source = source.as_str(),
        source_id,
        gross = %gross,
        taxable = %taxable,
        "recorded income"
    );
    Ok(Some(event))
}

/// Sum of gross income recorded for a customer on `from..=to`.
pub(crate) async fn income_between<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Decimal, LedgerError> {
    let events = TaxIncomeEvents::find()
        .filter(tax_income_events::Column::CustomerId.eq(customer_id))
        .filter(tax_income_events::Column::OccurredOn.between(from, to))
        .all(conn)
        .await
        .map_err(db_err)?;
    Ok(events.iter().map(|e| e.gross_amount).sum())
}

/// Records a payment against an assessment and marks it paid once covered.
pub(crate) async fn apply_assessment_payment<C: ConnectionTrait>(
    conn: &C,
    assessment: tax_assessments::Model,
    amount: Decimal,
    transaction_id: Option<Uuid>,
) -> Result<tax_assessments::Model, LedgerError> {
    let amount_paid = (assessment.amount_paid + amount).min(assessment.tax_amount);
    let paid = amount_paid >= assessment.tax_amount;
    let customer_id = assessment.customer_id;
    let assessment_id = assessment.id;

    let mut active = assessment.into_active_model();
    active.amount_paid = Set(amount_paid);
    if let Some(id) = transaction_id {
        active.payment_transaction_id = Set(Some(id));
    }
    if paid {
        active.status = Set(TaxAssessmentStatus::Paid);
        active.paid_at = Set(Some(Utc::now().into()));
    }
    let updated = active.update(conn).await.map_err(db_err)?;

    if paid {
        tracing::info!(assessment_id = %assessment_id, "tax assessment paid");
        resolve_cases(conn, CaseSubject::Assessment(assessment_id)).await?;
        lift_enforcement_if_clear(conn, customer_id).await?;
    }
    Ok(updated)
}

/// Repository for tax.
#[derive(Debug, Clone)]
pub struct TaxRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
    policy: TaxPolicy,
}

impl TaxRepository {
    /// Creates a new tax repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings, policy: TaxPolicy) -> Self {
        Self { db, settings, policy }
    }

    /// The policy in force.
    #[must_use]
    pub const fn policy(&self) -> &TaxPolicy {
        &self.policy
    }

    /// Records a taxable event. Replaying the same source event is a no-op.
    pub async fn record_income(
        &self,
        owner_identity: &str,
        source: IncomeSource,
        source_id: &str,
        gross: Decimal,
        occurred_on: NaiveDate,
    ) -> Result<RecordedIncome, TaxError> {
        let customer = find_customer(&self.db, owner_identity)
            .await?
            .ok_or_else(|| TaxError::CustomerNotFound(owner_identity.to_string()))?;

        if let Some(event) =
            record_income_in(&self.db, customer.id, source, source_id, gross, occurred_on).await?
        {
            return Ok(RecordedIncome {
                event,
                duplicate: false,
            });
        }

        let event = TaxIncomeEvents::find()
            .filter(tax_income_events::Column::SourceType.eq(db_enums::IncomeSource::from(source)))
            .filter(tax_income_events::Column::SourceId.eq(source_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| LedgerError::Internal(format!("income event {source_id} vanished")))?;
        Ok(RecordedIncome {
            event,
            duplicate: true,
        })
    }

    /// Sets the account weekly assessments are paid from.
    pub async fn register_tax_source_account(
        &self,
        owner_identity: &str,
        account: &AccountRef,
    ) -> Result<customers::Model, TaxError> {
        retry::run(&self.settings.retry, "register_tax_source_account", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = lock_customer(&txn, owner_identity)
                .await?
                .ok_or_else(|| TaxError::CustomerNotFound(owner_identity.to_string()))?;
            let account_id = owned_account(&txn, customer.id, account).await?;

            let mut active = customer.into_active_model();
            active.tax_source_account_id = Set(Some(account_id.into_inner()));
            active.updated_at = Set(Utc::now().into());
            let customer = active.update(&txn).await.map_err(db_err)?;
            txn.commit().await.map_err(db_err)?;
            tracing::info!(owner_identity, account_id = %account_id, "registered tax source account");
            Ok(customer)
        })
        .await
    }

    /// Assesses the week before `run_date` for every customer with income in it.
    ///
    /// Each customer is one unit of work. Customers already assessed for the
    /// period are skipped, so repeating the run for the same `run_date` only
    /// picks up the customers counted in `failed`.
    pub async fn run_weekly_assessment(&self, run_date: NaiveDate) -> Result<AssessmentRunReport, TaxError> {
        let period = TaxService::period_for(run_date);
        let customers: Vec<Uuid> = TaxIncomeEvents::find()
            .select_only()
            .column(tax_income_events::Column::CustomerId)
            .distinct()
            .filter(tax_income_events::Column::OccurredOn.between(period.start, period.end))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut report = AssessmentRunReport {
            period_start: Some(period.start),
            period_end: Some(period.end),
            ..AssessmentRunReport::default()
        };
        for customer_id in customers {
            let outcome = retry::run(&self.settings.retry, "assess_customer", || async move {
                self.assess_customer(customer_id, &period).await
            })
            .await;
            match outcome {
                Ok(Assessed::Skipped) => report.already_assessed += 1,
                Ok(Assessed::Created { paid }) => {
                    report.assessed += 1;
                    if paid {
                        report.paid_automatically += 1;
                    } else {
                        report.unpaid += 1;
                    }
                }
                Err(err) => {
                    tracing::error!(customer_id = %customer_id, error = %err, "tax assessment failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            period_start = %period.start,
            assessed = report.assessed,
            paid = report.paid_automatically,
            unpaid = report.unpaid,
            failed = report.failed,
            "weekly tax assessment finished"
        );
        Ok(report)
    }

    async fn assess_customer(&self, customer_id: Uuid, period: &AssessmentPeriod) -> Result<Assessed, TaxError> {
        let txn = ledger::begin(&self.db, &self.settings).await?;
        let customer = Customers::find_by_id(customer_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| TaxError::CustomerNotFound(customer_id.to_string()))?;

        let existing = TaxAssessments::find()
            .filter(tax_assessments::Column::CustomerId.eq(customer_id))
            .filter(tax_assessments::Column::PeriodStart.eq(period.start))
            .one(&txn)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Ok(Assessed::Skipped);
        }

        let events = TaxIncomeEvents::find()
            .filter(tax_income_events::Column::CustomerId.eq(customer_id))
            .filter(tax_income_events::Column::OccurredOn.between(period.start, period.end))
            .all(&txn)
            .await
            .map_err(db_err)?;
        let mut totals = IncomeTotals::default();
        for event in &events {
            totals.add(event.source_type.into(), event.gross_amount, event.taxable_amount);
        }
        let computation = TaxService::compute(&self.policy, &totals);
        let nothing_owed = computation.tax_amount.is_zero();

        let assessment = tax_assessments::ActiveModel {
            id: Set(AssessmentId::new().into_inner()),
            customer_id: Set(customer_id),
            period_start: Set(period.start),
            period_end: Set(period.end),
            total_income: Set(computation.total_income),
            taxable_income: Set(computation.taxable_income),
            tax_amount: Set(computation.tax_amount),
            amount_paid: Set(Decimal::ZERO),
            status: Set(if nothing_owed {
                TaxAssessmentStatus::Paid
            } else {
                TaxAssessmentStatus::Assessed
            }),
            due_on: Set(TaxService::due_on(&self.policy, period)),
            paid_at: Set(nothing_owed.then(|| Utc::now().into())),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;
        tracing::info!(
            customer_id = %customer_id,
            assessment_id = %assessment.id,
            taxable_income = %computation.taxable_income,
            tax_amount = %computation.tax_amount,
            "assessed tax"
        );

        let mut paid = nothing_owed;
        if !nothing_owed {
            if let Some(source) = customer.tax_source_account_id {
                paid = self
                    .try_auto_payment(&txn, assessment.clone(), AccountId::from_uuid(source))
                    .await?;
            }
            if !paid {
                open_case(
                    &txn,
                    customer_id,
                    CaseSubject::Assessment(assessment.id),
                    CaseStatus::InPaymentWindow,
                    None,
                )
                .await?;
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(Assessed::Created { paid })
    }

    /// Pays an assessment from the source account inside a savepoint.
    ///
    /// A business rejection rolls back only the savepoint; transient failures
    /// propagate so the whole customer is retried.
    async fn try_auto_payment(
        &self,
        txn: &DatabaseTransaction,
        assessment: tax_assessments::Model,
        source: AccountId,
    ) -> Result<bool, TaxError> {
        let savepoint = txn.begin().await.map_err(db_err)?;
        let amount = assessment.tax_amount - assessment.amount_paid;
        match self.pay_in(&savepoint, &assessment, &AccountRef::id(source), amount).await {
            Ok(transaction) => {
                savepoint.commit().await.map_err(db_err)?;
                apply_assessment_payment(txn, assessment, amount, Some(transaction.id.into_inner())).await?;
                Ok(true)
            }
            Err(err) if err.is_retryable() => Err(err.into()),
            Err(err) => {
                savepoint.rollback().await.map_err(db_err)?;
                tracing::warn!(assessment_id = %assessment.id, error = %err, "tax auto-payment failed");
                Ok(false)
            }
        }
    }

    async fn pay_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        assessment: &tax_assessments::Model,
        from: &AccountRef,
        amount: Decimal,
    ) -> Result<TransactionRecord, LedgerError> {
        let authority = ledger::system_account_id(conn, SystemRole::TaxAuthority).await?;
        ledger::transfer(
            conn,
            &TransferRequest {
                from: from.clone(),
                to: AccountRef::id(authority),
                amount,
                currency: self.settings.currency,
                description: Some(format!(
                    "Tax {} to {}",
                    assessment.period_start, assessment.period_end
                )),
                kind: TransferKind::Transfer,
                initiator: Initiator::Customer,
            },
        )
        .await
    }

    /// Pays the remaining amount of an assessment from any account.
    pub async fn pay_tax_assessment(
        &self,
        id: AssessmentId,
        from: &AccountRef,
    ) -> Result<tax_assessments::Model, TaxError> {
        retry::run(&self.settings.retry, "pay_tax_assessment", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let assessment = TaxAssessments::find_by_id(id.into_inner())
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or(TaxError::AssessmentNotFound(id))?;
            if assessment.status == TaxAssessmentStatus::Paid {
                return Err(TaxError::AlreadyPaid(id));
            }

            let amount = assessment.tax_amount - assessment.amount_paid;
            let transaction = self.pay_in(&txn, &assessment, from, amount).await?;
            let updated =
                apply_assessment_payment(&txn, assessment, amount, Some(transaction.id.into_inner()))
                    .await?;
            txn.commit().await.map_err(db_err)?;
            Ok::<_, TaxError>(updated)
        })
        .await
        .inspect_err(|e| tracing::warn!(assessment_id = %id, error = %e, "tax payment rejected"))
    }

    /// One assessment.
    pub async fn get_assessment(&self, id: AssessmentId) -> Result<tax_assessments::Model, TaxError> {
        TaxAssessments::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(TaxError::AssessmentNotFound(id))
    }

    /// A customer's assessments, newest period first.
    pub async fn list_assessments(&self, owner_identity: &str) -> Result<Vec<tax_assessments::Model>, TaxError> {
        let customer = find_customer(&self.db, owner_identity)
            .await?
            .ok_or_else(|| TaxError::CustomerNotFound(owner_identity.to_string()))?;
        Ok(TaxAssessments::find()
            .filter(tax_assessments::Column::CustomerId.eq(customer.id))
            .order_by_desc(tax_assessments::Column::PeriodStart)
            .all(&self.db)
            .await
            .map_err(db_err)?)
    }
}
