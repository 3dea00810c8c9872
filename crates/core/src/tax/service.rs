//! Tax rules: per-event taxable amounts, weekly computation, periods.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use kinko_shared::config::TaxConfig;
use rust_decimal::Decimal;

use super::error::TaxError;
use super::types::{AssessmentPeriod, IncomeSource, IncomeTotals, TaxBracket, TaxComputation};

/// Tax parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxPolicy {
    /// Weekday the assessment job runs.
    pub assessment_weekday: Weekday,
    /// Days after the period end before unpaid tax is overdue.
    pub payment_window_days: u32,
    /// Taxable income is floored to a multiple of this.
    pub rounding_unit: Decimal,
    /// Deduction on a period's gambling winnings.
    pub gambling_deduction: Decimal,
    /// Ascending bracket table.
    pub brackets: Vec<TaxBracket>,
}

impl From<&TaxConfig> for TaxPolicy {
    fn from(config: &TaxConfig) -> Self {
        Self {
            assessment_weekday: config.assessment_weekday,
            payment_window_days: config.payment_window_days,
            rounding_unit: config.rounding_unit,
            gambling_deduction: config.gambling_deduction,
            brackets: config
                .brackets
                .iter()
                .map(|b| TaxBracket {
                    up_to: b.up_to,
                    rate: b.rate,
                    deduction: b.deduction,
                })
                .collect(),
        }
    }
}

/// Pure tax rules.
pub struct TaxService;

impl TaxService {
    /// Taxable amount of one income event.
    ///
    /// Capital losses are recorded with a zero taxable amount. Gambling
    /// events carry their full winnings; the deduction applies per period.
    ///
    /// # Errors
    ///
    /// `InvalidIncome` for negative wages, dividends or gambling winnings.
    pub fn taxable_amount(source: IncomeSource, gross: Decimal) -> Result<Decimal, TaxError> {
        match source {
            IncomeSource::CapitalGains => Ok(gross.max(Decimal::ZERO)),
            _ if gross < Decimal::ZERO => Err(TaxError::InvalidIncome {
                income_source: source,
                amount: gross,
            }),
            _ => Ok(gross),
        }
    }

    /// Applies deductions, rounding and the bracket table.
    #[must_use]
    pub fn compute(policy: &TaxPolicy, totals: &IncomeTotals) -> TaxComputation {
        let gambling = (totals.gambling - policy.gambling_deduction).max(Decimal::ZERO) / Decimal::TWO;
        let taxable = Self::floor_to_unit(totals.ordinary_taxable + gambling, policy.rounding_unit);

        let tax = policy
            .brackets
            .iter()
            .find(|b| b.up_to.is_none_or(|limit| taxable <= limit))
            .map_or(Decimal::ZERO, |b| taxable * b.rate - b.deduction)
            .max(Decimal::ZERO)
            .trunc();

        TaxComputation {
            total_income: totals.gross,
            taxable_income: taxable,
            tax_amount: tax,
        }
    }

    /// The Monday-to-Sunday week before the week containing `run_date`.
    #[must_use]
    pub fn period_for(run_date: NaiveDate) -> AssessmentPeriod {
        let days_into_week = u64::from(run_date.weekday().num_days_from_monday());
        let this_monday = run_date - Days::new(days_into_week);
        let start = this_monday - Days::new(7);
        AssessmentPeriod {
            start,
            end: start + Days::new(6),
        }
    }

    /// Last day of the payment window.
    #[must_use]
    pub fn due_on(policy: &TaxPolicy, period: &AssessmentPeriod) -> NaiveDate {
        period.end + Days::new(u64::from(policy.payment_window_days))
    }

    /// Returns true if the weekly assessment runs on `date`.
    #[must_use]
    pub fn is_assessment_day(policy: &TaxPolicy, date: NaiveDate) -> bool {
        date.weekday() == policy.assessment_weekday
    }

    fn floor_to_unit(amount: Decimal, unit: Decimal) -> Decimal {
        if unit <= Decimal::ZERO {
            return amount.trunc();
        }
        (amount / unit).floor() * unit
    }
}
