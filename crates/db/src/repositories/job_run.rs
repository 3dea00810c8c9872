//! Once-per-business-day guards for scheduled jobs.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::prelude::*;
use crate::entities::scheduled_job_runs;

/// Repository for scheduled job runs.
#[derive(Debug, Clone)]
pub struct JobRunRepository {
    db: DatabaseConnection,
}

impl JobRunRepository {
    /// Creates a new job run repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns true if `job_name` already completed for `run_date`.
    pub async fn already_ran(&self, job_name: &str, run_date: NaiveDate) -> Result<bool, DbErr> {
        Ok(ScheduledJobRuns::find_by_id((job_name.to_string(), run_date))
            .one(&self.db)
            .await?
            .is_some())
    }

    /// Marks `job_name` complete for `run_date`. A second record is ignored.
    pub async fn record(
        &self,
        job_name: &str,
        run_date: NaiveDate,
        summary: serde_json::Value,
    ) -> Result<(), DbErr> {
        ScheduledJobRuns::insert(scheduled_job_runs::ActiveModel {
            job_name: Set(job_name.to_string()),
            run_date: Set(run_date),
            summary: Set(Some(summary)),
            completed_at: Set(Utc::now().into()),
        })
        .on_conflict(
            OnConflict::columns([
                scheduled_job_runs::Column::JobName,
                scheduled_job_runs::Column::RunDate,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await?;
        tracing::debug!(job_name, run_date = %run_date, "recorded job run");
        Ok(())
    }

    /// The most recent run of a job, if any.
    pub async fn last_run(&self, job_name: &str) -> Result<Option<scheduled_job_runs::Model>, DbErr> {
        ScheduledJobRuns::find()
            .filter(scheduled_job_runs::Column::JobName.eq(job_name))
            .order_by_desc(scheduled_job_runs::Column::RunDate)
            .one(&self.db)
            .await
    }
}
