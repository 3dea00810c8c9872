//! Collections cases and the daily enforcement sweep.

use chrono::{NaiveDate, Utc};
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::collections::{
    CaseKind, CaseState, CaseStatus, CollectionsError, CollectionsPolicy, CollectionsService,
    Obligation,
};
use kinko_core::ledger::{Initiator, LedgerError, TransferKind, TransferRequest};
use kinko_core::loans::{LoanPaymentKind, LoanService, LoanStatus};
use kinko_shared::types::AccountId;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

use super::account::{find_customer, set_blacklist, set_enforcement_freeze};
use super::loan::{record_payment, save_state, to_state};
use super::tax::apply_assessment_payment;
use crate::entities::prelude::*;
use crate::entities::sea_orm_active_enums as db_enums;
use crate::entities::{accounts, collection_seizures, collections_cases};
use crate::error::db_err;
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// The obligation a case follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseSubject {
    Assessment(Uuid),
    Loan(Uuid),
}

impl CaseSubject {
    const fn kind(self) -> CaseKind {
        match self {
            Self::Assessment(_) => CaseKind::Tax,
            Self::Loan(_) => CaseKind::Loan,
        }
    }

    fn column_filter(self) -> sea_orm::sea_query::SimpleExpr {
        match self {
            Self::Assessment(id) => collections_cases::Column::AssessmentId.eq(id),
            Self::Loan(id) => collections_cases::Column::LoanId.eq(id),
        }
    }

    fn of(case: &collections_cases::Model) -> Option<Self> {
        match CaseKind::from(case.kind) {
            CaseKind::Tax => case.assessment_id.map(Self::Assessment),
            CaseKind::Loan => case.loan_id.map(Self::Loan),
        }
    }
}

/// Opens a case unless the obligation already has an unresolved one.
///
/// Returns true if a case was created.
pub(crate) async fn open_case<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    subject: CaseSubject,
    status: CaseStatus,
    overdue_since: Option<NaiveDate>,
) -> Result<bool, LedgerError> {
    let (assessment_id, loan_id) = match subject {
        CaseSubject::Assessment(id) => (Some(id), None),
        CaseSubject::Loan(id) => (None, Some(id)),
    };
    let inserted = CollectionsCases::insert(collections_cases::ActiveModel {
        id: Set(Uuid::now_v7()),
        customer_id: Set(customer_id),
        kind: Set(subject.kind().into()),
        status: Set(status.into()),
        assessment_id: Set(assessment_id),
        loan_id: Set(loan_id),
        overdue_since: Set(overdue_since),
        blacklisted: Set(false),
        ..Default::default()
    })
    .on_conflict(OnConflict::new().do_nothing().to_owned())
    .exec_without_returning(conn)
    .await
    .map_err(db_err)?;

    if inserted > 0 {
        tracing::info!(customer_id = %customer_id, kind = ?subject.kind(), status = ?status, "opened collections case");
    }
    Ok(inserted > 0)
}

/// Resolves the unresolved cases of an obligation. Returns how many changed.
pub(crate) async fn resolve_cases<C: ConnectionTrait>(
    conn: &C,
    subject: CaseSubject,
) -> Result<u64, LedgerError> {
    let open = CollectionsCases::find()
        .filter(subject.column_filter())
        .filter(collections_cases::Column::Status.ne(db_enums::CaseStatus::Resolved))
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut resolved = 0;
    for case in open {
        let id = case.id;
        mark_resolved(conn, case).await?;
        tracing::info!(case_id = %id, "collections case resolved");
        resolved += 1;
    }
    Ok(resolved)
}

async fn mark_resolved<C: ConnectionTrait>(
    conn: &C,
    case: collections_cases::Model,
) -> Result<collections_cases::Model, LedgerError> {
    let mut active = case.into_active_model();
    active.status = Set(db_enums::CaseStatus::Resolved);
    active.resolved_at = Set(Some(Utc::now().into()));
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await.map_err(db_err)
}

/// Lifts the blacklist and enforcement freezes once no case is open.
///
/// Returns true if the customer has no unresolved case.
pub(crate) async fn lift_enforcement_if_clear<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
) -> Result<bool, LedgerError> {
    let open = CollectionsCases::find()
        .filter(collections_cases::Column::CustomerId.eq(customer_id))
        .filter(collections_cases::Column::Status.ne(db_enums::CaseStatus::Resolved))
        .count(conn)
        .await
        .map_err(db_err)?;
    if open > 0 {
        return Ok(false);
    }
    let unblacklisted = set_blacklist(conn, customer_id, None).await?;
    let unfrozen = set_enforcement_freeze(conn, customer_id, false).await?;
    if unblacklisted || !unfrozen.is_empty() {
        tracing::info!(customer_id = %customer_id, unfrozen = unfrozen.len(), "enforcement lifted");
    }
    Ok(true)
}

/// A status change made by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseTransition {
    /// The case.
    pub case_id: Uuid,
    /// Debtor.
    pub owner_identity: String,
    /// Kind.
    pub kind: CaseKind,
    /// Status before the sweep.
    pub from: CaseStatus,
    /// Status after the sweep.
    pub to: CaseStatus,
    /// Whether the sweep blacklisted the debtor.
    pub blacklisted: bool,
}

/// One debit made by a seizure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeizureMovement {
    /// The case.
    pub case_id: Uuid,
    /// Debited account.
    pub account_id: AccountId,
    /// Amount seized.
    pub amount: Decimal,
    /// Ledger transaction.
    pub transaction_id: Uuid,
}

/// Summary of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SweepReport {
    /// Business date of the sweep.
    pub business_date: Option<NaiveDate>,
    /// Unresolved cases examined.
    pub examined: usize,
    /// Cases resolved by this sweep.
    pub resolved: usize,
    /// Status changes.
    pub transitions: Vec<CaseTransition>,
    /// Debits made by seizures.
    pub seizures: Vec<SeizureMovement>,
    /// Cases whose sweep failed and will be retried next run.
    pub failed: usize,
}

#[derive(Default)]
struct CaseOutcome {
    transition: Option<CaseTransition>,
    seizures: Vec<SeizureMovement>,
    resolved: bool,
}

/// Repository for collections.
#[derive(Debug, Clone)]
pub struct CollectionsRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
    policy: CollectionsPolicy,
}

impl CollectionsRepository {
    /// Creates a new collections repository.
    #[must_use]
    pub const fn new(
        db: DatabaseConnection,
        settings: LedgerSettings,
        policy: CollectionsPolicy,
    ) -> Self {
        Self { db, settings, policy }
    }

    /// Escalates every unresolved case for `today` and seizes where due.
    ///
    /// Each case is its own unit of work. The amount due is read fresh from
    /// the obligation, so re-running the sweep never collects twice.
    pub async fn sweep(&self, today: NaiveDate) -> Result<SweepReport, CollectionsError> {
        let ids: Vec<Uuid> = CollectionsCases::find()
            .select_only()
            .column(collections_cases::Column::Id)
            .filter(collections_cases::Column::Status.ne(db_enums::CaseStatus::Resolved))
            .order_by_asc(collections_cases::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let mut report = SweepReport {
            business_date: Some(today),
            examined: ids.len(),
            ..SweepReport::default()
        };
        for id in ids {
            let outcome = retry::run(&self.settings.retry, "collections_sweep", || async move {
                self.sweep_case(id, today).await
            })
            .await;
            match outcome {
                Ok(outcome) => {
                    report.transitions.extend(outcome.transition);
                    report.seizures.extend(outcome.seizures);
                    if outcome.resolved {
                        report.resolved += 1;
                    }
                }
                Err(err) => {
                    tracing::error!(case_id = %id, error = %err, "collections sweep failed for case");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            business_date = %today,
            examined = report.examined,
            transitions = report.transitions.len(),
            seizures = report.seizures.len(),
            resolved = report.resolved,
            failed = report.failed,
            "collections sweep finished"
        );
        Ok(report)
    }

    async fn sweep_case(&self, id: Uuid, today: NaiveDate) -> Result<CaseOutcome, CollectionsError> {
        let txn = ledger::begin(&self.db, &self.settings).await?;
        let peek = CollectionsCases::find_by_id(id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(CollectionsError::CaseNotFound(id))?;
        let subject = CaseSubject::of(&peek).ok_or(CollectionsError::ObligationMissing(id))?;

        // Obligation rows are locked before case rows, as payments do.
        let obligation = self.lock_obligation(&txn, id, subject).await?;
        let case = CollectionsCases::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or(CollectionsError::CaseNotFound(id))?;
        let state = CaseState {
            kind: case.kind.into(),
            status: case.status.into(),
            overdue_since: case.overdue_since,
            blacklisted: case.blacklisted,
        };
        if state.status == CaseStatus::Resolved {
            return Ok(CaseOutcome::default());
        }

        let decision = CollectionsService::evaluate(&self.policy, &state, &obligation, today);
        let customer_id = case.customer_id;
        let owner_identity = Customers::find_by_id(customer_id)
            .one(&txn)
            .await
            .map_err(db_err)?
            .map(|c| c.owner_identity)
            .unwrap_or_default();

        if decision.blacklist && !state.blacklisted {
            let reason = match subject {
                CaseSubject::Assessment(assessment) => format!("unpaid tax assessment {assessment}"),
                CaseSubject::Loan(loan) => format!("overdue loan {loan}"),
            };
            set_blacklist(&txn, customer_id, Some(&reason)).await?;
        }

        let mut outcome = CaseOutcome::default();
        let mut status = decision.status;
        if let Some(amount_due) = decision.seize {
            outcome.seizures = self.seize(&txn, &case, subject, amount_due, today).await?;
            let seized: Decimal = outcome.seizures.iter().map(|s| s.amount).sum();
            if seized >= amount_due {
                status = CaseStatus::Resolved;
            }
        }

        if status != state.status {
            outcome.transition = Some(CaseTransition {
                case_id: id,
                owner_identity,
                kind: state.kind,
                from: state.status,
                to: status,
                blacklisted: decision.blacklist,
            });
        }

        let mut active = case.into_active_model();
        active.status = Set(status.into());
        active.overdue_since = Set(decision.overdue_since);
        active.blacklisted = Set(decision.blacklist);
        active.last_swept_on = Set(Some(today));
        if status == CaseStatus::Resolved {
            active.resolved_at = Set(Some(Utc::now().into()));
        }
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await.map_err(db_err)?;

        if status == CaseStatus::Resolved {
            outcome.resolved = true;
            lift_enforcement_if_clear(&txn, customer_id).await?;
        }

        txn.commit().await.map_err(db_err)?;
        if let Some(transition) = &outcome.transition {
            tracing::info!(
                case_id = %id,
                from = ?transition.from,
                to = ?transition.to,
                blacklisted = transition.blacklisted,
                "collections case escalated"
            );
        }
        Ok(outcome)
    }

    async fn lock_obligation(
        &self,
        txn: &DatabaseTransaction,
        case_id: Uuid,
        subject: CaseSubject,
    ) -> Result<Obligation, CollectionsError> {
        match subject {
            CaseSubject::Assessment(id) => {
                let assessment = TaxAssessments::find_by_id(id)
                    .lock_exclusive()
                    .one(txn)
                    .await
                    .map_err(db_err)?
                    .ok_or(CollectionsError::ObligationMissing(case_id))?;
                let amount_due = if assessment.status == db_enums::TaxAssessmentStatus::Paid {
                    Decimal::ZERO
                } else {
                    (assessment.tax_amount - assessment.amount_paid).max(Decimal::ZERO)
                };
                Ok(Obligation {
                    amount_due,
                    due_on: Some(assessment.due_on),
                    failing_since: None,
                })
            }
            CaseSubject::Loan(id) => {
                let loan = Loans::find_by_id(id)
                    .lock_exclusive()
                    .one(txn)
                    .await
                    .map_err(db_err)?
                    .ok_or(CollectionsError::ObligationMissing(case_id))?;
                let amount_due = if LoanStatus::from(loan.status) == LoanStatus::Resolved {
                    Decimal::ZERO
                } else {
                    loan.outstanding
                };
                Ok(Obligation {
                    amount_due,
                    due_on: None,
                    failing_since: loan.autopay_failed_since,
                })
            }
        }
    }

    /// Freezes the debtor's accounts and debits them toward the obligation.
    ///
    /// Accounts are debited in ascending id order until the amount is
    /// covered; a shortfall leaves the case in seizure for the next sweep.
    async fn seize(
        &self,
        txn: &DatabaseTransaction,
        case: &collections_cases::Model,
        subject: CaseSubject,
        amount_due: Decimal,
        today: NaiveDate,
    ) -> Result<Vec<SeizureMovement>, CollectionsError> {
        let role = match subject {
            CaseSubject::Assessment(_) => SystemRole::TaxAuthority,
            CaseSubject::Loan(_) => SystemRole::LoanReserve,
        };
        let destination = ledger::system_account_id(txn, role).await?;
        let own: Vec<AccountId> = Accounts::find()
            .filter(accounts::Column::CustomerId.eq(case.customer_id))
            .all(txn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|a| AccountId::from_uuid(a.id))
            .collect();
        let locked =
            ledger::lock_accounts(txn, own.iter().copied().chain(std::iter::once(destination))).await?;
        set_enforcement_freeze(txn, case.customer_id, true).await?;
        let debtor_accounts: Vec<_> = own
            .iter()
            .filter_map(|id| locked.get(*id).ok().cloned())
            .collect();
        let plan = CollectionsService::plan_seizure(&debtor_accounts, amount_due);

        let mut movements = Vec::with_capacity(plan.len());
        for (account_id, amount) in plan {
            let transaction = ledger::transfer(
                txn,
                &TransferRequest {
                    from: AccountRef::id(account_id),
                    to: AccountRef::id(destination),
                    amount,
                    currency: self.settings.currency,
                    description: Some(format!("Seizure for collections case {}", case.id)),
                    kind: TransferKind::Transfer,
                    initiator: Initiator::System,
                },
            )
            .await?;
            tracing::info!(
                case_id = %case.id,
                account_id = %account_id,
                amount = %amount,
                transaction_id = %transaction.id,
                "seized funds"
            );
            movements.push(SeizureMovement {
                case_id: case.id,
                account_id,
                amount,
                transaction_id: transaction.id.into_inner(),
            });
        }

        for movement in &movements {
            collection_seizures::ActiveModel {
                id: Set(Uuid::now_v7()),
                case_id: Set(case.id),
                account_id: Set(movement.account_id.into_inner()),
                amount: Set(movement.amount),
                ledger_transaction_id: Set(movement.transaction_id),
                business_date: Set(today),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(db_err)?;
        }
        match subject {
            CaseSubject::Assessment(id) => book_tax_seizure(txn, case.id, id, &movements).await?,
            CaseSubject::Loan(id) => book_loan_seizure(txn, id, &movements, today).await?,
        }
        Ok(movements)
    }

    /// Unresolved and resolved cases of a customer, newest first.
    pub async fn list_cases(&self, owner_identity: &str) -> Result<Vec<collections_cases::Model>, CollectionsError> {
        let Some(customer) = find_customer(&self.db, owner_identity).await? else {
            return Ok(Vec::new());
        };
        Ok(CollectionsCases::find()
            .filter(collections_cases::Column::CustomerId.eq(customer.id))
            .order_by_desc(collections_cases::Column::OpenedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?)
    }

    /// Seizure debits booked against a case.
    pub async fn list_seizures(&self, case_id: Uuid) -> Result<Vec<collection_seizures::Model>, CollectionsError> {
        Ok(CollectionSeizures::find()
            .filter(collection_seizures::Column::CaseId.eq(case_id))
            .order_by_asc(collection_seizures::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?)
    }
}

async fn book_loan_seizure(
    txn: &DatabaseTransaction,
    loan_id: Uuid,
    movements: &[SeizureMovement],
    today: NaiveDate,
) -> Result<(), CollectionsError> {
    if movements.is_empty() {
        return Ok(());
    }
    let loan = Loans::find_by_id(loan_id)
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| LedgerError::Internal(format!("loan {loan_id} vanished")))?;

    let mut state = to_state(&loan);
    for movement in movements {
        record_payment(
            txn,
            loan_id,
            LoanPaymentKind::Seizure,
            movement.amount,
            Ok(movement.transaction_id),
            today,
        )
        .await?;
        state = LoanService::apply_payment(state, movement.amount, LoanPaymentKind::Seizure, today);
    }
    save_state(txn, loan, &state).await?;
    Ok(())
}

async fn book_tax_seizure(
    txn: &DatabaseTransaction,
    case_id: Uuid,
    assessment_id: Uuid,
    movements: &[SeizureMovement],
) -> Result<(), CollectionsError> {
    for movement in movements {
        let assessment = TaxAssessments::find_by_id(assessment_id)
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or(CollectionsError::ObligationMissing(case_id))?;
        apply_assessment_payment(txn, assessment, movement.amount, Some(movement.transaction_id)).await?;
    }
    Ok(())
}
