//! Loan rules: eligibility, pricing, accrual, autopay and repayment.

use chrono::NaiveDate;
use kinko_shared::config::LoanConfig;
use rust_decimal::Decimal;

use super::error::LoanError;
use super::types::{Eligibility, LoanPaymentKind, LoanQuote, LoanState, LoanStatus};

/// Days into an autopay failure streak on which a reminder is due.
pub const NOTICE_DAYS: [i64; 4] = [0, 2, 4, 6];

/// Decimal places of a weekly rate.
const RATE_SCALE: u32 = 6;

/// Decimal places of accrued interest (ledger scale).
const INTEREST_SCALE: u32 = 4;

/// Lending parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanPolicy {
    /// Days of income history in the baseline.
    pub income_window_days: u32,
    /// Principal cap as a multiple of the weekly baseline.
    pub principal_multiple: Decimal,
    /// Weekly rate per unit of principal/baseline.
    pub base_rate_factor: Decimal,
    /// Upper bound of the normal weekly rate.
    pub max_weekly_rate: Decimal,
    /// Weekly rate while autopay is failing.
    pub penalty_weekly_rate: Decimal,
    /// Unit of principals and manual repayments.
    pub repayment_unit: Decimal,
    /// Share of the principal collected per autopay run.
    pub autopay_fraction: Decimal,
}

impl From<&LoanConfig> for LoanPolicy {
    fn from(config: &LoanConfig) -> Self {
        Self {
            income_window_days: config.income_window_days,
            principal_multiple: config.principal_multiple,
            base_rate_factor: config.base_rate_factor,
            max_weekly_rate: config.max_weekly_rate,
            penalty_weekly_rate: config.penalty_weekly_rate,
            repayment_unit: config.repayment_unit,
            autopay_fraction: config.autopay_fraction,
        }
    }
}

/// Pure loan rules.
pub struct LoanService;

impl LoanService {
    /// Weekly average of the income recorded in the baseline window.
    #[must_use]
    pub fn income_baseline(policy: &LoanPolicy, income_in_window: Decimal) -> Decimal {
        if policy.income_window_days == 0 {
            return Decimal::ZERO;
        }
        (income_in_window * Decimal::from(7) / Decimal::from(policy.income_window_days))
            .round_dp(INTEREST_SCALE)
    }

    /// Decides a borrowing request.
    ///
    /// # Errors
    ///
    /// `Blacklisted`, `ActiveLoanExists`, `NoIncomeBaseline`,
    /// `InvalidPrincipal`, `PrincipalExceedsLimit`.
    pub fn quote(
        policy: &LoanPolicy,
        eligibility: &Eligibility,
        principal: Decimal,
        autopay_amount: Option<Decimal>,
    ) -> Result<LoanQuote, LoanError> {
        if eligibility.blacklisted {
            return Err(LoanError::Blacklisted);
        }
        if eligibility.has_active_loan {
            return Err(LoanError::ActiveLoanExists);
        }
        let baseline = Self::income_baseline(policy, eligibility.income_in_window);
        if baseline <= Decimal::ZERO {
            return Err(LoanError::NoIncomeBaseline);
        }
        if !Self::is_unit_multiple(policy, principal) {
            return Err(LoanError::InvalidPrincipal(principal));
        }
        let max_principal = baseline * policy.principal_multiple;
        if principal > max_principal {
            return Err(LoanError::PrincipalExceedsLimit {
                requested: principal,
                limit: max_principal,
            });
        }

        let weekly_rate = (principal / baseline * policy.base_rate_factor)
            .min(policy.max_weekly_rate)
            .round_dp(RATE_SCALE);
        let autopay_amount = match autopay_amount {
            Some(amount) if amount > Decimal::ZERO => amount.min(principal),
            Some(amount) => return Err(LoanError::InvalidRepayment(amount)),
            None => Self::default_autopay_amount(policy, principal),
        };

        Ok(LoanQuote {
            principal,
            income_baseline: baseline,
            max_principal,
            weekly_rate,
            penalty_weekly_rate: policy.penalty_weekly_rate,
            autopay_amount,
        })
    }

    /// `principal * autopay_fraction`, rounded up to the repayment unit.
    #[must_use]
    pub fn default_autopay_amount(policy: &LoanPolicy, principal: Decimal) -> Decimal {
        let raw = principal * policy.autopay_fraction;
        if policy.repayment_unit <= Decimal::ZERO {
            return raw.ceil().min(principal);
        }
        ((raw / policy.repayment_unit).ceil() * policy.repayment_unit).min(principal)
    }

    /// Rate in force: the penalty rate while autopay is failing.
    #[must_use]
    pub const fn effective_weekly_rate(state: &LoanState) -> Decimal {
        if state.autopay_failed_since.is_some() {
            state.penalty_weekly_rate
        } else {
            state.weekly_rate
        }
    }

    /// Interest to accrue for `today`, if accrual has not run yet.
    #[must_use]
    pub fn accrual_due(state: &LoanState, today: NaiveDate) -> Option<Decimal> {
        if state.status != LoanStatus::Active
            || state.outstanding <= Decimal::ZERO
            || state.last_accrued_on.is_some_and(|d| d >= today)
        {
            return None;
        }
        Some(
            (state.outstanding * Self::effective_weekly_rate(state) / Decimal::from(7))
                .round_dp(INTEREST_SCALE),
        )
    }

    /// Applies one day of accrual.
    #[must_use]
    pub fn apply_accrual(state: LoanState, today: NaiveDate) -> LoanState {
        match Self::accrual_due(&state, today) {
            Some(interest) => LoanState {
                outstanding: state.outstanding + interest,
                last_accrued_on: Some(today),
                ..state
            },
            None => state,
        }
    }

    /// Amount the autopay run for `today` should collect, if it has not run yet.
    #[must_use]
    pub fn autopay_due(state: &LoanState, today: NaiveDate) -> Option<Decimal> {
        if state.status != LoanStatus::Active
            || state.outstanding <= Decimal::ZERO
            || state.last_autopay_on.is_some_and(|d| d >= today)
        {
            return None;
        }
        Some(state.autopay_amount.min(state.outstanding))
    }

    /// Applies a successful payment.
    ///
    /// Autopay and manual payments clear the failure streak; seizures do not,
    /// so the collections case follows the loan until it is paid off.
    #[must_use]
    pub fn apply_payment(
        state: LoanState,
        amount: Decimal,
        kind: LoanPaymentKind,
        today: NaiveDate,
    ) -> LoanState {
        let outstanding = (state.outstanding - amount).max(Decimal::ZERO);
        let status = if outstanding.is_zero() {
            LoanStatus::Resolved
        } else {
            state.status
        };
        LoanState {
            outstanding,
            status,
            autopay_failed_since: match kind {
                LoanPaymentKind::Seizure if status == LoanStatus::Active => {
                    state.autopay_failed_since
                }
                _ => None,
            },
            last_autopay_on: if kind == LoanPaymentKind::Autopay {
                Some(today)
            } else {
                state.last_autopay_on
            },
            ..state
        }
    }

    /// Records a failed autopay run. The streak keeps its first day.
    #[must_use]
    pub fn apply_autopay_failure(state: LoanState, today: NaiveDate) -> LoanState {
        LoanState {
            autopay_failed_since: state.autopay_failed_since.or(Some(today)),
            last_autopay_on: Some(today),
            ..state
        }
    }

    /// Returns true if a failure reminder is due on `today`.
    #[must_use]
    pub fn notice_due(state: &LoanState, today: NaiveDate) -> bool {
        state.status == LoanStatus::Active
            && state
                .autopay_failed_since
                .is_some_and(|since| NOTICE_DAYS.contains(&(today - since).num_days()))
    }

    /// Validates a manual repayment and returns the amount to collect.
    ///
    /// # Errors
    ///
    /// `InvalidRepayment` unless the amount is a positive multiple of the
    /// repayment unit. The collected amount is capped at the outstanding
    /// balance, so the final payment may be fractional.
    pub fn repayment_amount(
        policy: &LoanPolicy,
        requested: Decimal,
        outstanding: Decimal,
    ) -> Result<Decimal, LoanError> {
        if !Self::is_unit_multiple(policy, requested) {
            return Err(LoanError::InvalidRepayment(requested));
        }
        Ok(requested.min(outstanding))
    }

    fn is_unit_multiple(policy: &LoanPolicy, amount: Decimal) -> bool {
        amount > Decimal::ZERO
            && (policy.repayment_unit <= Decimal::ZERO || (amount % policy.repayment_unit).is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn policy() -> LoanPolicy {
        LoanPolicy::from(&LoanConfig::default())
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn eligibility(income: Decimal) -> Eligibility {
        Eligibility {
            blacklisted: false,
            has_active_loan: false,
            income_in_window: income,
        }
    }

    fn state(outstanding: Decimal) -> LoanState {
        LoanState {
            outstanding,
            weekly_rate: dec!(0.07),
            penalty_weekly_rate: dec!(0.14),
            autopay_amount: dec!(2000),
            status: LoanStatus::Active,
            autopay_failed_since: None,
            last_accrued_on: None,
            last_autopay_on: None,
        }
    }

    #[test]
    fn test_baseline_is_weekly_average() {
        assert_eq!(LoanService::income_baseline(&policy(), dec!(40000)), dec!(10000));
    }

    #[test]
    fn test_quote_terms() {
        // baseline 10,000/week: cap 30,000, rate min(20,000/10,000 * 0.05, 0.15).
        let quote = LoanService::quote(&policy(), &eligibility(dec!(40000)), dec!(20000), None).unwrap();
        assert_eq!(quote.max_principal, dec!(30000));
        assert_eq!(quote.weekly_rate, dec!(0.1));
        assert_eq!(quote.autopay_amount, dec!(2000));
    }

    #[test]
    fn test_rate_capped() {
        let mut p = policy();
        p.principal_multiple = dec!(10);
        let quote = LoanService::quote(&p, &eligibility(dec!(40000)), dec!(90000), None).unwrap();
        assert_eq!(quote.weekly_rate, dec!(0.15));
    }

    #[test]
    fn test_rejections() {
        let p = policy();
        let mut e = eligibility(dec!(40000));
        assert!(matches!(
            LoanService::quote(&p, &e, dec!(31000), None),
            Err(LoanError::PrincipalExceedsLimit { .. })
        ));
        assert_eq!(
            LoanService::quote(&p, &e, dec!(1500), None),
            Err(LoanError::InvalidPrincipal(dec!(1500)))
        );
        e.has_active_loan = true;
        assert_eq!(LoanService::quote(&p, &e, dec!(1000), None), Err(LoanError::ActiveLoanExists));
        e.blacklisted = true;
        assert_eq!(LoanService::quote(&p, &e, dec!(1000), None), Err(LoanError::Blacklisted));
        assert_eq!(
            LoanService::quote(&p, &eligibility(Decimal::ZERO), dec!(1000), None),
            Err(LoanError::NoIncomeBaseline)
        );
    }

    #[test]
    fn test_default_autopay_rounds_up_to_unit() {
        assert_eq!(LoanService::default_autopay_amount(&policy(), dec!(25000)), dec!(3000));
        assert_eq!(LoanService::default_autopay_amount(&policy(), dec!(1000)), dec!(1000));
    }

    #[test]
    fn test_accrual_once_per_day() {
        let s = state(dec!(7000));
        assert_eq!(LoanService::accrual_due(&s, date(1)), Some(dec!(70)));
        let accrued = LoanService::apply_accrual(s, date(1));
        assert_eq!(accrued.outstanding, dec!(7070));
        assert_eq!(LoanService::apply_accrual(accrued, date(1)), accrued);
    }

    #[test]
    fn test_penalty_rate_while_failing() {
        let mut s = state(dec!(7000));
        s.autopay_failed_since = Some(date(1));
        assert_eq!(LoanService::accrual_due(&s, date(2)), Some(dec!(140)));
    }

    #[test]
    fn test_autopay_capped_and_once_per_day() {
        let s = state(dec!(1500));
        assert_eq!(LoanService::autopay_due(&s, date(3)), Some(dec!(1500)));
        let paid = LoanService::apply_payment(s, dec!(1500), LoanPaymentKind::Autopay, date(3));
        assert_eq!(paid.status, LoanStatus::Resolved);
        assert_eq!(LoanService::autopay_due(&paid, date(4)), None);

        let failed = LoanService::apply_autopay_failure(state(dec!(9000)), date(3));
        assert_eq!(LoanService::autopay_due(&failed, date(3)), None);
        assert!(LoanService::autopay_due(&failed, date(4)).is_some());
    }

    #[test]
    fn test_failure_streak() {
        let first = LoanService::apply_autopay_failure(state(dec!(9000)), date(1));
        let second = LoanService::apply_autopay_failure(first, date(2));
        assert_eq!(second.autopay_failed_since, Some(date(1)));

        let notices: Vec<u32> = (1..=10)
            .filter(|d| LoanService::notice_due(&second, date(*d)))
            .collect();
        assert_eq!(notices, vec![1, 3, 5, 7]);

        let cleared = LoanService::apply_payment(second, dec!(1000), LoanPaymentKind::Manual, date(4));
        assert_eq!(cleared.autopay_failed_since, None);

        let seized = LoanService::apply_payment(second, dec!(1000), LoanPaymentKind::Seizure, date(4));
        assert_eq!(seized.autopay_failed_since, Some(date(1)));
    }

    #[test]
    fn test_repayment_amount() {
        let p = policy();
        assert_eq!(LoanService::repayment_amount(&p, dec!(3000), dec!(2500.5)), Ok(dec!(2500.5)));
        assert_eq!(LoanService::repayment_amount(&p, dec!(2000), dec!(9000)), Ok(dec!(2000)));
        assert_eq!(
            LoanService::repayment_amount(&p, dec!(2500), dec!(9000)),
            Err(LoanError::InvalidRepayment(dec!(2500)))
        );
        assert!(LoanService::repayment_amount(&p, dec!(0), dec!(9000)).is_err());
    }
}
