//! Kinko background worker.
//!
//! Ticks on a fixed interval and runs each scheduled job at most once per
//! run date. A job that failed, or left items failed, is not recorded and is
//! retried on the next tick.

mod schedule;

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use kinko_core::collections::CollectionsPolicy;
use kinko_core::loans::LoanPolicy;
use kinko_core::tax::TaxPolicy;
use kinko_db::{
    CollectionsRepository, JobRunRepository, LedgerSettings, LoanRepository, TaxRepository,
    connect,
};
use kinko_shared::AppConfig;
use kinko_shared::config::SchedulerConfig;
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use schedule::{Job, JobReport, due_jobs};

struct Worker {
    scheduler: SchedulerConfig,
    loans: LoanRepository,
    tax: TaxRepository,
    collections: CollectionsRepository,
    jobs: JobRunRepository,
}

impl Worker {
    async fn tick(&self) -> anyhow::Result<()> {
        let zone = self.scheduler.time_zone().map_err(anyhow::Error::msg)?;
        let now = Utc::now().with_timezone(&zone).naive_local();

        for (job, run_date) in due_jobs(now, self.scheduler.daily_run_hour, self.tax.policy()) {
            if self.jobs.already_ran(job.name(), run_date).await? {
                continue;
            }
            let completed = match job {
                Job::LoanMaintenance => {
                    self.run(job, run_date, self.loans.run_daily_maintenance(run_date)).await?
                }
                Job::TaxAssessment => {
                    self.run(job, run_date, self.tax.run_weekly_assessment(run_date)).await?
                }
                Job::CollectionsSweep => {
                    self.run(job, run_date, self.collections.sweep(run_date)).await?
                }
            };
            if !completed {
                // Later jobs depend on the state this one leaves behind.
                break;
            }
        }
        Ok(())
    }

    /// Runs one job and records its summary once nothing in it failed.
    ///
    /// Returns false only if the job as a whole failed. A report with
    /// per-item failures is left unrecorded so the next tick retries it.
    async fn run<T, E>(
        &self,
        job: Job,
        run_date: NaiveDate,
        work: impl Future<Output = Result<T, E>>,
    ) -> anyhow::Result<bool>
    where
        T: Serialize + JobReport,
        E: Display,
    {
        info!(job = job.name(), business_date = %run_date, "job started");
        match work.await {
            Ok(report) => {
                let summary = serde_json::to_value(&report)?;
                if report.is_complete() {
                    info!(job = job.name(), business_date = %run_date, %summary, "job completed");
                    self.jobs.record(job.name(), run_date, summary).await?;
                } else {
                    warn!(
                        job = job.name(),
                        business_date = %run_date,
                        failed = report.failed(),
                        %summary,
                        "job incomplete, will retry"
                    );
                }
                Ok(true)
            }
            Err(e) => {
                error!(job = job.name(), business_date = %run_date, error = %e, "job failed");
                Ok(false)
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinko=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let db = connect(&config.database).await?;
    let settings = LedgerSettings::from_config(&config)?;

    let worker = Worker {
        scheduler: config.scheduler.clone(),
        loans: LoanRepository::new(db.clone(), settings, LoanPolicy::from(&config.loans)),
        tax: TaxRepository::new(db.clone(), settings, TaxPolicy::from(&config.tax)),
        collections: CollectionsRepository::new(
            db.clone(),
            settings,
            CollectionsPolicy::from(&config.collections),
        ),
        jobs: JobRunRepository::new(db),
    };
    worker.scheduler.time_zone().map_err(anyhow::Error::msg)?;

    let mut ticker = interval(Duration::from_secs(config.scheduler.tick_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        timezone = %config.scheduler.timezone,
        tick_interval_secs = config.scheduler.tick_interval_secs,
        daily_run_hour = config.scheduler.daily_run_hour,
        "Worker started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = worker.tick().await {
                    warn!(error = %e, "scheduler tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Worker shutting down");
                break;
            }
        }
    }
    Ok(())
}
