//! Tax domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of taxable income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeSource {
    /// Salary paid by an employer.
    Wages,
    /// Stock dividends.
    Dividends,
    /// Realized gain (or loss) on a sale.
    CapitalGains,
    /// Net winnings of a game round.
    Gambling,
}

impl IncomeSource {
    /// Stable name used in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wages => "wages",
            Self::Dividends => "dividends",
            Self::CapitalGains => "capital_gains",
            Self::Gambling => "gambling",
        }
    }
}

/// Assessment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxAssessmentStatus {
    /// Owed, not yet fully paid.
    Assessed,
    /// Fully paid (or nothing was owed).
    Paid,
}

/// One row of the progressive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBracket {
    /// Inclusive upper bound; `None` for the top bracket.
    pub up_to: Option<Decimal>,
    /// Marginal rate.
    pub rate: Decimal,
    /// Quick deduction.
    pub deduction: Decimal,
}

/// Income of one customer in one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IncomeTotals {
    /// Sum of gross amounts of every event.
    pub gross: Decimal,
    /// Taxable wages, dividends and capital gains.
    pub ordinary_taxable: Decimal,
    /// Gambling winnings before the special deduction.
    pub gambling: Decimal,
}

impl IncomeTotals {
    /// Adds one event.
    pub fn add(&mut self, source: IncomeSource, gross: Decimal, taxable: Decimal) {
        self.gross += gross;
        match source {
            IncomeSource::Gambling => self.gambling += taxable,
            _ => self.ordinary_taxable += taxable,
        }
    }
}

/// Result of applying the table to a period's income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxComputation {
    /// Gross income.
    pub total_income: Decimal,
    /// Taxable income after deductions and rounding.
    pub taxable_income: Decimal,
    /// Tax owed, whole units.
    pub tax_amount: Decimal,
}

/// An assessment period (Monday to Sunday inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssessmentPeriod {
    /// First day.
    pub start: NaiveDate,
    /// Last day.
    pub end: NaiveDate,
}
