//! Database seeder for Kinko development and testing.
//!
//! Creates the branches, the system accounts, a funded loan reserve and two
//! demo customers. Running it again changes nothing that already exists.
//!
//! Usage: cargo run --bin seeder

use kinko_core::account::{
    AccountRef, AccountType, BranchCode, InitialCredentials, OpenAccountRequest, SystemRole,
};
use kinko_core::ledger::{Initiator, MovementRequest};
use kinko_db::{AccountRepository, LedgerRepository, LedgerSettings};
use kinko_shared::AppConfig;
use rust_decimal::Decimal;
use tracing::info;

const BRANCHES: [(&str, &str); 3] = [
    ("101", "Head Office"),
    ("102", "Station Branch"),
    ("201", "Harbor Branch"),
];

/// Demo customers: identity, display name, PIN, opening deposit.
const CUSTOMERS: [(&str, &str, &str, i64); 2] = [
    ("demo-alice", "Alice", "1234", 500_000),
    ("demo-bob", "Bob", "5678", 120_000),
];

const LOAN_RESERVE_FUNDING: i64 = 50_000_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kinko=info".into()),
        )
        .init();

    let config = AppConfig::load()?;
    let db = kinko_db::connect(&config.database).await?;
    let settings = LedgerSettings::from_config(&config)?;
    let accounts = AccountRepository::new(db.clone(), settings);
    let ledger = LedgerRepository::new(db, settings);

    for (code, name) in BRANCHES {
        accounts.ensure_branch(&BranchCode::parse(code)?, name).await?;
    }
    info!(count = BRANCHES.len(), "Seeded branches");

    accounts.ensure_system_accounts().await?;
    info!("Seeded system accounts");

    seed_loan_reserve(&accounts, &ledger, &settings).await?;

    for (owner, display_name, pin, opening) in CUSTOMERS {
        if accounts.get_account(owner).await?.is_some() {
            info!(owner, "Customer already seeded");
            continue;
        }
        let account = accounts
            .open_account(&OpenAccountRequest {
                owner_identity: owner.to_string(),
                branch_code: BranchCode::parse(BRANCHES[0].0)?,
                account_type: AccountType::Ordinary,
                credentials: InitialCredentials {
                    display_name: display_name.to_string(),
                    pin: pin.to_string(),
                },
            })
            .await?;
        ledger
            .deposit(&deposit(AccountRef::id(account.id), opening, &settings))
            .await?;
        info!(owner, account_number = %account.account_number, "Seeded customer");
    }

    info!("Seeding complete");
    Ok(())
}

async fn seed_loan_reserve(
    accounts: &AccountRepository,
    ledger: &LedgerRepository,
    settings: &LedgerSettings,
) -> anyhow::Result<()> {
    let reserve = accounts
        .get_account(&SystemRole::LoanReserve.owner_identity())
        .await?
        .ok_or_else(|| anyhow::anyhow!("loan reserve account is missing"))?;
    if reserve.balance > Decimal::ZERO {
        info!(balance = %reserve.balance, "Loan reserve already funded");
        return Ok(());
    }
    ledger
        .deposit(&deposit(
            AccountRef::id(reserve.id),
            LOAN_RESERVE_FUNDING,
            settings,
        ))
        .await?;
    info!(amount = LOAN_RESERVE_FUNDING, "Funded loan reserve");
    Ok(())
}

fn deposit(account: AccountRef, amount: i64, settings: &LedgerSettings) -> MovementRequest {
    MovementRequest {
        account,
        amount: Decimal::from(amount),
        currency: settings.currency,
        description: Some("seed funding".to_string()),
        initiator: Initiator::System,
    }
}
