//! Escalation rules and seizure planning.

use chrono::{Days, NaiveDate};
use kinko_shared::config::CollectionsConfig;
use kinko_shared::types::AccountId;
use rust_decimal::Decimal;

use super::types::{CaseDecision, CaseKind, CaseState, CaseStatus, Obligation};
use crate::ledger::{AccountSnapshot, AccountStatus};

/// Grace periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionsPolicy {
    /// Days a loan may stay overdue before blacklisting.
    pub loan_blacklist_after_days: u32,
    /// Days overdue before seizure.
    pub seizure_after_days: u32,
}

impl From<&CollectionsConfig> for CollectionsPolicy {
    fn from(config: &CollectionsConfig) -> Self {
        Self {
            loan_blacklist_after_days: config.loan_blacklist_after_days,
            seizure_after_days: config.seizure_after_days,
        }
    }
}

/// Pure collections rules.
pub struct CollectionsService;

impl CollectionsService {
    /// Decides the case status for `today`.
    ///
    /// Status never moves backwards except to `resolved`, and a blacklist
    /// set by a case stays until the case resolves.
    #[must_use]
    pub fn evaluate(
        policy: &CollectionsPolicy,
        case: &CaseState,
        obligation: &Obligation,
        today: NaiveDate,
    ) -> CaseDecision {
        if case.status == CaseStatus::Resolved || obligation.amount_due <= Decimal::ZERO {
            return Self::resolved(case);
        }

        let (computed, overdue_since, blacklist) = match case.kind {
            CaseKind::Tax => {
                let Some(due_on) = obligation.due_on else {
                    return Self::resolved(case);
                };
                if today <= due_on && case.overdue_since.is_none() {
                    (CaseStatus::InPaymentWindow, None, false)
                } else {
                    let since = case.overdue_since.unwrap_or(due_on + Days::new(1));
                    let status = if today >= since + Days::new(u64::from(policy.seizure_after_days)) {
                        CaseStatus::Seizure
                    } else {
                        CaseStatus::Overdue
                    };
                    (status, Some(since), true)
                }
            }
            CaseKind::Loan => {
                let Some(failing_since) = obligation.failing_since else {
                    return Self::resolved(case);
                };
                let since = case.overdue_since.unwrap_or(failing_since);
                let status = if today >= since + Days::new(u64::from(policy.seizure_after_days)) {
                    CaseStatus::Seizure
                } else {
                    CaseStatus::Overdue
                };
                let blacklist =
                    today >= since + Days::new(u64::from(policy.loan_blacklist_after_days));
                (status, Some(since), blacklist)
            }
        };

        let status = computed.max(case.status);
        CaseDecision {
            status,
            overdue_since,
            blacklist: blacklist || case.blacklisted,
            seize: (status == CaseStatus::Seizure).then_some(obligation.amount_due),
        }
    }

    /// Plans the debits of a seizure: accounts in ascending id order, each
    /// up to its balance, until `amount_due` is covered. Closed accounts and
    /// empty accounts are skipped.
    #[must_use]
    pub fn plan_seizure(accounts: &[AccountSnapshot], amount_due: Decimal) -> Vec<(AccountId, Decimal)> {
        let mut sorted: Vec<&AccountSnapshot> = accounts
            .iter()
            .filter(|a| a.status != AccountStatus::Closed && a.balance > Decimal::ZERO)
            .collect();
        sorted.sort_by_key(|a| a.id);

        let mut remaining = amount_due;
        let mut plan = Vec::new();
        for account in sorted {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = account.balance.min(remaining);
            plan.push((account.id, take));
            remaining -= take;
        }
        plan
    }

    fn resolved(case: &CaseState) -> CaseDecision {
        CaseDecision {
            status: CaseStatus::Resolved,
            overdue_since: case.overdue_since,
            blacklist: false,
            seize: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinko_shared::types::Currency;
    use rust_decimal_macros::dec;

    fn policy() -> CollectionsPolicy {
        CollectionsPolicy::from(&CollectionsConfig::default())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn case(kind: CaseKind, status: CaseStatus) -> CaseState {
        CaseState {
            kind,
            status,
            overdue_since: None,
            blacklisted: false,
        }
    }

    fn tax_due(amount: Decimal) -> Obligation {
        Obligation {
            amount_due: amount,
            due_on: Some(date(10)),
            failing_since: None,
        }
    }

    fn loan_failing(amount: Decimal) -> Obligation {
        Obligation {
            amount_due: amount,
            due_on: None,
            failing_since: Some(date(1)),
        }
    }

    #[test]
    fn test_tax_case_escalation() {
        let p = policy();
        let open = case(CaseKind::Tax, CaseStatus::InPaymentWindow);

        let window = CollectionsService::evaluate(&p, &open, &tax_due(dec!(5000)), date(10));
        assert_eq!(window.status, CaseStatus::InPaymentWindow);
        assert!(!window.blacklist);

        let overdue = CollectionsService::evaluate(&p, &open, &tax_due(dec!(5000)), date(11));
        assert_eq!(overdue.status, CaseStatus::Overdue);
        assert_eq!(overdue.overdue_since, Some(date(11)));
        assert!(overdue.blacklist);
        assert_eq!(overdue.seize, None);

        let mut persisted = open;
        persisted.status = overdue.status;
        persisted.overdue_since = overdue.overdue_since;
        persisted.blacklisted = true;
        let seizing = CollectionsService::evaluate(&p, &persisted, &tax_due(dec!(5000)), date(25));
        assert_eq!(seizing.status, CaseStatus::Seizure);
        assert_eq!(seizing.seize, Some(dec!(5000)));

        let not_yet = CollectionsService::evaluate(&p, &persisted, &tax_due(dec!(5000)), date(24));
        assert_eq!(not_yet.status, CaseStatus::Overdue);
    }

    #[test]
    fn test_loan_case_escalation() {
        let p = policy();
        let open = case(CaseKind::Loan, CaseStatus::Overdue);

        let day6 = CollectionsService::evaluate(&p, &open, &loan_failing(dec!(9000)), date(7));
        assert_eq!(day6.status, CaseStatus::Overdue);
        assert!(!day6.blacklist);

        let day7 = CollectionsService::evaluate(&p, &open, &loan_failing(dec!(9000)), date(8));
        assert!(day7.blacklist);
        assert_eq!(day7.status, CaseStatus::Overdue);

        let day14 = CollectionsService::evaluate(&p, &open, &loan_failing(dec!(9000)), date(15));
        assert_eq!(day14.status, CaseStatus::Seizure);
        assert_eq!(day14.seize, Some(dec!(9000)));
    }

    #[test]
    fn test_resolution() {
        let p = policy();
        let seizing = CaseState {
            kind: CaseKind::Loan,
            status: CaseStatus::Seizure,
            overdue_since: Some(date(1)),
            blacklisted: true,
        };
        let mut cleared = loan_failing(dec!(9000));
        cleared.failing_since = None;
        let decision = CollectionsService::evaluate(&p, &seizing, &cleared, date(20));
        assert_eq!(decision.status, CaseStatus::Resolved);
        assert!(!decision.blacklist);

        let paid = CollectionsService::evaluate(&p, &seizing, &loan_failing(dec!(0)), date(20));
        assert_eq!(paid.status, CaseStatus::Resolved);
    }

    #[test]
    fn test_status_never_regresses() {
        let p = policy();
        let seizing = CaseState {
            kind: CaseKind::Tax,
            status: CaseStatus::Seizure,
            overdue_since: Some(date(11)),
            blacklisted: true,
        };
        let decision = CollectionsService::evaluate(&p, &seizing, &tax_due(dec!(100)), date(12));
        assert_eq!(decision.status, CaseStatus::Seizure);
        assert!(!decision.changes(&seizing));
    }

    fn snapshot(balance: Decimal, status: AccountStatus) -> AccountSnapshot {
        AccountSnapshot {
            id: AccountId::new(),
            currency: Currency::Jpy,
            status,
            balance,
        }
    }

    #[test]
    fn test_seizure_plan_in_id_order() {
        let a = snapshot(dec!(300), AccountStatus::Frozen);
        let b = snapshot(dec!(0), AccountStatus::Frozen);
        let c = snapshot(dec!(1000), AccountStatus::Closed);
        let d = snapshot(dec!(500), AccountStatus::Active);
        let accounts = vec![d.clone(), c, b, a.clone()];

        let plan = CollectionsService::plan_seizure(&accounts, dec!(600));
        assert_eq!(plan, vec![(a.id, dec!(300)), (d.id, dec!(300))]);

        let partial = CollectionsService::plan_seizure(&accounts, dec!(5000));
        let total: Decimal = partial.iter().map(|(_, amount)| *amount).sum();
        assert_eq!(total, dec!(800));
    }
}
