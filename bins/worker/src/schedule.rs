//! Which jobs are due on a tick, and whether a run counts as done.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike};
use kinko_core::tax::TaxPolicy;
use kinko_db::repositories::{AssessmentRunReport, MaintenanceReport, SweepReport};

/// A scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Loan interest accrual and autopay.
    LoanMaintenance,
    /// Weekly tax assessment.
    TaxAssessment,
    /// Collections escalation and seizure.
    CollectionsSweep,
}

impl Job {
    /// Name stored in `scheduled_job_runs`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LoanMaintenance => "loan_maintenance",
            Self::TaxAssessment => "tax_assessment",
            Self::CollectionsSweep => "collections_sweep",
        }
    }
}

/// Jobs due at local time `now` with the run date each runs for, in run order.
///
/// Nothing runs before `daily_run_hour`. The assessment always targets the
/// latest assessment day, so a run that was missed or left customers
/// unassessed is picked up again on the following days. The sweep runs last
/// so it sees the cases opened by maintenance and assessment.
#[must_use]
pub fn due_jobs(now: NaiveDateTime, daily_run_hour: u32, tax: &TaxPolicy) -> Vec<(Job, NaiveDate)> {
    if now.hour() < daily_run_hour {
        return Vec::new();
    }
    let today = now.date();
    vec![
        (Job::LoanMaintenance, today),
        (Job::TaxAssessment, latest_assessment_day(today, tax)),
        (Job::CollectionsSweep, today),
    ]
}

/// The most recent assessment weekday on or before `today`.
fn latest_assessment_day(today: NaiveDate, tax: &TaxPolicy) -> NaiveDate {
    let back = (7 + today.weekday().num_days_from_monday()
        - tax.assessment_weekday.num_days_from_monday())
        % 7;
    today - Days::new(u64::from(back))
}

/// A job summary that may report per-item failures.
pub trait JobReport {
    /// Items that failed and must be run again.
    fn failed(&self) -> usize;

    /// True when nothing is left to retry, so the run may be recorded.
    fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}

impl JobReport for MaintenanceReport {
    fn failed(&self) -> usize {
        self.failed
    }
}

impl JobReport for AssessmentRunReport {
    fn failed(&self) -> usize {
        self.failed
    }
}

impl JobReport for SweepReport {
    fn failed(&self) -> usize {
        self.failed
    }
}
