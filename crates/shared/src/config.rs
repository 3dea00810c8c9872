//! Application configuration management.
//!
//! Sources, lowest priority first: `config/default.toml`,
//! `config/{RUN_MODE}.toml`, then `KINKO__*` environment variables.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Service token configuration.
    pub jwt: JwtSettings,
    /// Ledger engine configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Chip economy configuration.
    #[serde(default)]
    pub chips: ChipConfig,
    /// Loan configuration.
    #[serde(default)]
    pub loans: LoanConfig,
    /// Taxation configuration.
    #[serde(default)]
    pub tax: TaxConfig,
    /// Collections configuration.
    #[serde(default)]
    pub collections: CollectionsConfig,
    /// Background scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Row lock wait budget for one unit of work, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

/// Service token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Service token expiration in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
}

fn default_token_expiry() -> u64 {
    3600
}

/// Ledger engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Currency code new accounts are opened in.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Attempts per unit of work before surfacing a transient failure.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Linear backoff step between attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_currency() -> String {
    "JPY".to_string()
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

/// Chip economy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChipConfig {
    /// Cash price of one chip.
    #[serde(default = "default_chip_price")]
    pub price_per_chip: Decimal,
    /// Cash paid out per redeemed base chip.
    #[serde(default = "default_chip_redeem_rate")]
    pub redeem_rate: Decimal,
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self {
            price_per_chip: default_chip_price(),
            redeem_rate: default_chip_redeem_rate(),
        }
    }
}

fn default_chip_price() -> Decimal {
    Decimal::ONE
}

fn default_chip_redeem_rate() -> Decimal {
    Decimal::ONE
}

/// Loan configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoanConfig {
    /// Days of income history used for the income baseline.
    #[serde(default = "default_income_window_days")]
    pub income_window_days: u32,
    /// Principal cap as a multiple of the weekly income baseline.
    #[serde(default = "default_principal_multiple")]
    pub principal_multiple: Decimal,
    /// Weekly rate per unit of principal/income ratio.
    #[serde(default = "default_base_rate_factor")]
    pub base_rate_factor: Decimal,
    /// Upper bound of the normal weekly rate.
    #[serde(default = "default_max_weekly_rate")]
    pub max_weekly_rate: Decimal,
    /// Weekly rate applied while autopay is failing.
    #[serde(default = "default_penalty_weekly_rate")]
    pub penalty_weekly_rate: Decimal,
    /// Unit that principals and manual repayments must be multiples of.
    #[serde(default = "default_repayment_unit")]
    pub repayment_unit: Decimal,
    /// Share of the principal collected by each autopay run.
    #[serde(default = "default_autopay_fraction")]
    pub autopay_fraction: Decimal,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            income_window_days: default_income_window_days(),
            principal_multiple: default_principal_multiple(),
            base_rate_factor: default_base_rate_factor(),
            max_weekly_rate: default_max_weekly_rate(),
            penalty_weekly_rate: default_penalty_weekly_rate(),
            repayment_unit: default_repayment_unit(),
            autopay_fraction: default_autopay_fraction(),
        }
    }
}

fn default_income_window_days() -> u32 {
    28
}

fn default_principal_multiple() -> Decimal {
    Decimal::from(3)
}

fn default_base_rate_factor() -> Decimal {
    Decimal::new(5, 2)
}

fn default_max_weekly_rate() -> Decimal {
    Decimal::new(15, 2)
}

fn default_penalty_weekly_rate() -> Decimal {
    Decimal::new(25, 2)
}

fn default_repayment_unit() -> Decimal {
    Decimal::from(1_000)
}

fn default_autopay_fraction() -> Decimal {
    Decimal::new(10, 2)
}

/// One row of the progressive tax table.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxBracketConfig {
    /// Inclusive upper bound of taxable income; `None` for the top bracket.
    pub up_to: Option<Decimal>,
    /// Marginal rate.
    pub rate: Decimal,
    /// Amount subtracted from `taxable * rate`.
    pub deduction: Decimal,
}

/// Taxation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxConfig {
    /// Weekday the weekly assessment runs on (for the preceding week).
    #[serde(default = "default_assessment_weekday")]
    pub assessment_weekday: Weekday,
    /// Days after the period end before an unpaid assessment is overdue.
    #[serde(default = "default_payment_window_days")]
    pub payment_window_days: u32,
    /// Taxable income is floored to a multiple of this before bracket lookup.
    #[serde(default = "default_rounding_unit")]
    pub rounding_unit: Decimal,
    /// Special deduction applied to a period's gambling winnings.
    #[serde(default = "default_gambling_deduction")]
    pub gambling_deduction: Decimal,
    /// Progressive bracket table, ascending.
    #[serde(default = "default_brackets")]
    pub brackets: Vec<TaxBracketConfig>,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            assessment_weekday: default_assessment_weekday(),
            payment_window_days: default_payment_window_days(),
            rounding_unit: default_rounding_unit(),
            gambling_deduction: default_gambling_deduction(),
            brackets: default_brackets(),
        }
    }
}

fn default_assessment_weekday() -> Weekday {
    Weekday::Mon
}

fn default_payment_window_days() -> u32 {
    7
}

fn default_rounding_unit() -> Decimal {
    Decimal::from(1_000)
}

fn default_gambling_deduction() -> Decimal {
    Decimal::from(500_000)
}

fn default_brackets() -> Vec<TaxBracketConfig> {
    let row = |up_to: Option<i64>, rate_pct: i64, deduction: i64| TaxBracketConfig {
        up_to: up_to.map(Decimal::from),
        rate: Decimal::new(rate_pct, 2),
        deduction: Decimal::from(deduction),
    };
    vec![
        row(Some(1_950_000), 5, 0),
        row(Some(3_300_000), 10, 97_500),
        row(Some(6_950_000), 20, 427_500),
        row(Some(9_000_000), 23, 636_000),
        row(Some(18_000_000), 33, 1_536_000),
        row(Some(40_000_000), 40, 2_796_000),
        row(None, 45, 4_796_000),
    ]
}

/// Collections configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsConfig {
    /// Days a loan may stay overdue before the borrower is blacklisted.
    #[serde(default = "default_loan_blacklist_after_days")]
    pub loan_blacklist_after_days: u32,
    /// Days overdue before seizure starts.
    #[serde(default = "default_seizure_after_days")]
    pub seizure_after_days: u32,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            loan_blacklist_after_days: default_loan_blacklist_after_days(),
            seizure_after_days: default_seizure_after_days(),
        }
    }
}

fn default_loan_blacklist_after_days() -> u32 {
    7
}

fn default_seizure_after_days() -> u32 {
    14
}

/// Background scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// IANA time zone the business day is computed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Local hour after which the daily jobs may run.
    #[serde(default = "default_daily_run_hour")]
    pub daily_run_hour: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_interval_secs: default_tick_interval_secs(),
            daily_run_hour: default_daily_run_hour(),
        }
    }
}

impl SchedulerConfig {
    /// Parses the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns the parse message for an unknown zone name.
    pub fn time_zone(&self) -> Result<Tz, String> {
        self.timezone.parse::<Tz>().map_err(|e| e.to_string())
    }

    /// Business date of `now` in the configured time zone.
    ///
    /// # Errors
    ///
    /// Returns the parse message for an unknown zone name.
    pub fn business_date(&self, now: DateTime<Utc>) -> Result<NaiveDate, String> {
        Ok(now.with_timezone(&self.time_zone()?).date_naive())
    }
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_daily_run_hour() -> u32 {
    4
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KINKO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_date_uses_time_zone() {
        let scheduler = SchedulerConfig::default();
        // 2026-06-01 16:30 UTC is already June 2nd in Tokyo.
        let now = DateTime::parse_from_rfc3339("2026-06-01T16:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            scheduler.business_date(now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 2).unwrap()
        );

        let bad = SchedulerConfig {
            timezone: "Mars/Olympus".to_string(),
            ..SchedulerConfig::default()
        };
        assert!(bad.business_date(now).is_err());
    }

    #[test]
    fn test_load_from_environment() {
        temp_env::with_vars(
            [
                ("KINKO__DATABASE__URL", Some("postgres://localhost/kinko_test")),
                ("KINKO__JWT__SECRET", Some("secret")),
                ("KINKO__DATABASE__LOCK_TIMEOUT_MS", Some("1500")),
                ("KINKO__LEDGER__RETRY_ATTEMPTS", Some("5")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.database.url, "postgres://localhost/kinko_test");
                assert_eq!(config.database.lock_timeout_ms, 1500);
                assert_eq!(config.ledger.retry_attempts, 5);
                assert_eq!(config.ledger.currency, "JPY");
                assert_eq!(config.server.port, 8080);
            },
        );
    }

    #[test]
    fn test_defaults() {
        let tax = TaxConfig::default();
        assert_eq!(tax.brackets.len(), 7);
        assert!(tax.brackets.last().unwrap().up_to.is_none());
        assert_eq!(tax.assessment_weekday, Weekday::Mon);

        let collections = CollectionsConfig::default();
        assert_eq!(collections.seizure_after_days, 14);
        assert_eq!(collections.loan_blacklist_after_days, 7);

        assert_eq!(SchedulerConfig::default().timezone, "Asia/Tokyo");
    }

    #[test]
    fn test_default_brackets_ascend() {
        let brackets = default_brackets();
        let bounds: Vec<Decimal> = brackets.iter().filter_map(|b| b.up_to).collect();
        assert!(bounds.windows(2).all(|w| w[0] < w[1]));
    }
}
