//! Account store repository.
//!
//! Customers, branches, accounts and credentials. Balances are never written
//! here; they only change through the ledger unit of work.

use chrono::Utc;
use kinko_core::account::number::MAX_SEQUENCE;
use kinko_core::account::{
    Account, AccountError, AccountNumber, AccountNumberError, AccountRef, AccountType, BranchCode,
    OpenAccountRequest, SystemRole,
};
use kinko_core::auth::{hash_pin, is_locked, verify_pin};
use kinko_core::ledger::{AccountStatus, LedgerError, LedgerService};
use kinko_shared::types::{AccountId, CustomerId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, IntoActiveModel, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set, Statement,
};
use uuid::Uuid;

use crate::entities::prelude::*;
use crate::entities::sea_orm_active_enums::{self as db_enums};
use crate::entities::{accounts, branches, customers};
use crate::error::{db_err, sqlstate};
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// Owner identities under this prefix belong to system accounts.
const SYSTEM_IDENTITY_PREFIX: &str = "system:";

/// Stored in place of a hash for customers that can never authenticate.
const UNUSABLE_CREDENTIAL: &str = "!locked";

/// Postgres `sequence_generator_limit_exceeded`.
const SEQUENCE_EXHAUSTED: &str = "2200H";

/// An account row joined with its branch code and owner identity.
#[derive(Debug, FromQueryResult)]
struct AccountRow {
    id: Uuid,
    customer_id: Uuid,
    account_number: String,
    account_type: db_enums::AccountType,
    status: db_enums::AccountStatus,
    currency: String,
    balance: Decimal,
    opened_at: chrono::DateTime<chrono::FixedOffset>,
    branch_code: String,
    owner_identity: String,
}

impl AccountRow {
    fn into_account(self) -> Result<Account, LedgerError> {
        let corrupt = |e: AccountNumberError| LedgerError::Internal(e.to_string());
        Ok(Account {
            id: AccountId::from_uuid(self.id),
            account_number: AccountNumber::parse(&self.account_number).map_err(corrupt)?,
            branch_code: BranchCode::parse(&self.branch_code).map_err(corrupt)?,
            customer_id: CustomerId::from_uuid(self.customer_id),
            owner_identity: self.owner_identity,
            account_type: self.account_type.into(),
            status: self.status.into(),
            currency: ledger::parse_currency(&self.currency)?,
            balance: self.balance,
            opened_at: self.opened_at.with_timezone(&Utc),
        })
    }
}

fn account_query() -> Select<Accounts> {
    Accounts::find()
        .join(JoinType::InnerJoin, accounts::Relation::Branches.def())
        .join(JoinType::InnerJoin, accounts::Relation::Customers.def())
        .column_as(branches::Column::Code, "branch_code")
        .column_as(customers::Column::OwnerIdentity, "owner_identity")
}

async fn load_accounts<C: ConnectionTrait>(
    conn: &C,
    query: Select<Accounts>,
) -> Result<Vec<Account>, LedgerError> {
    query
        .order_by_asc(accounts::Column::OpenedAt)
        .order_by_asc(accounts::Column::Id)
        .into_model::<AccountRow>()
        .all(conn)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(AccountRow::into_account)
        .collect()
}

/// Loads one account view by id.
pub(crate) async fn account_view<C: ConnectionTrait>(
    conn: &C,
    id: AccountId,
) -> Result<Option<Account>, LedgerError> {
    let rows = load_accounts(
        conn,
        account_query().filter(accounts::Column::Id.eq(id.into_inner())),
    )
    .await?;
    Ok(rows.into_iter().next())
}

/// Finds a customer by owner identity.
pub(crate) async fn find_customer<C: ConnectionTrait>(
    conn: &C,
    owner_identity: &str,
) -> Result<Option<customers::Model>, LedgerError> {
    Customers::find()
        .filter(customers::Column::OwnerIdentity.eq(owner_identity))
        .one(conn)
        .await
        .map_err(db_err)
}

/// Finds a customer by owner identity and locks the row.
pub(crate) async fn lock_customer<C: ConnectionTrait>(
    conn: &C,
    owner_identity: &str,
) -> Result<Option<customers::Model>, LedgerError> {
    Customers::find()
        .filter(customers::Column::OwnerIdentity.eq(owner_identity))
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(db_err)
}

/// Resolves a reference and checks the account belongs to the customer.
pub(crate) async fn owned_account<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    reference: &AccountRef,
) -> Result<AccountId, LedgerError> {
    let id = ledger::resolve(conn, reference).await?;
    let owned = Accounts::find_by_id(id.into_inner())
        .one(conn)
        .await
        .map_err(db_err)?
        .is_some_and(|a| a.customer_id == customer_id);
    if owned {
        Ok(id)
    } else {
        Err(LedgerError::InvalidAccountReference(format!(
            "account {reference} does not belong to the customer"
        )))
    }
}

/// Freezes (or unfreezes) every account of a customer for enforcement.
///
/// Unfreezing only touches accounts frozen by enforcement. Closed accounts
/// are never changed. Returns the accounts whose status changed.
pub(crate) async fn set_enforcement_freeze<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    freeze: bool,
) -> Result<Vec<AccountId>, LedgerError> {
    let rows = Accounts::find()
        .filter(accounts::Column::CustomerId.eq(customer_id))
        .order_by_asc(accounts::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut changed = Vec::new();
    for row in rows {
        let current = AccountStatus::from(row.status);
        if current == AccountStatus::Closed || (!freeze && !row.frozen_by_enforcement) {
            continue;
        }
        let next = LedgerService::next_enforcement_status(current, freeze);
        if next == current && row.frozen_by_enforcement == freeze {
            continue;
        }
        let id = AccountId::from_uuid(row.id);
        let mut active = row.into_active_model();
        active.status = Set(next.into());
        active.frozen_by_enforcement = Set(freeze);
        active.updated_at = Set(Utc::now().into());
        active.update(conn).await.map_err(db_err)?;
        changed.push(id);
    }
    if !changed.is_empty() {
        tracing::info!(customer_id = %customer_id, freeze, accounts = changed.len(), "enforcement status changed");
    }
    Ok(changed)
}

/// Sets or lifts a customer's blacklist flag.
pub(crate) async fn set_blacklist<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    reason: Option<&str>,
) -> Result<bool, LedgerError> {
    let update = Customers::update_many()
        .filter(customers::Column::Id.eq(customer_id))
        .col_expr(customers::Column::UpdatedAt, Expr::current_timestamp().into());
    let result = match reason {
        Some(reason) => update
            .filter(customers::Column::BlacklistedAt.is_null())
            .col_expr(customers::Column::BlacklistedAt, Expr::current_timestamp().into())
            .col_expr(customers::Column::BlacklistReason, Expr::value(reason)),
        None => update
            .filter(customers::Column::BlacklistedAt.is_not_null())
            .col_expr(
                customers::Column::BlacklistedAt,
                Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
            )
            .col_expr(
                customers::Column::BlacklistReason,
                Expr::value(Option::<String>::None),
            ),
    }
    .exec(conn)
    .await
    .map_err(db_err)?;

    let changed = result.rows_affected > 0;
    if changed {
        tracing::info!(customer_id = %customer_id, blacklisted = reason.is_some(), "blacklist changed");
    }
    Ok(changed)
}

async fn next_account_number<C: ConnectionTrait>(conn: &C) -> Result<AccountNumber, AccountError> {
    let statement = Statement::from_string(
        conn.get_database_backend(),
        "SELECT nextval('account_number_seq') AS seq",
    );
    let row = match conn.query_one(statement).await {
        Ok(row) => row,
        Err(err) if sqlstate(&err).as_deref() == Some(SEQUENCE_EXHAUSTED) => {
            tracing::error!("account number sequence exhausted");
            return Err(AccountNumberError::SequenceOutOfRange(MAX_SEQUENCE + 1).into());
        }
        Err(err) => return Err(db_err(err).into()),
    };
    let seq: i64 = row
        .ok_or_else(|| LedgerError::Internal("nextval returned no row".into()))?
        .try_get("", "seq")
        .map_err(db_err)?;
    Ok(AccountNumber::from_sequence(seq)?)
}

/// Inserts the customer unless it exists, then locks it.
async fn ensure_customer<C: ConnectionTrait>(
    conn: &C,
    owner_identity: &str,
    display_name: &str,
    credential_hash: String,
) -> Result<customers::Model, AccountError> {
    let customer = customers::ActiveModel {
        id: Set(CustomerId::new().into_inner()),
        owner_identity: Set(owner_identity.to_string()),
        display_name: Set(display_name.to_string()),
        credential_hash: Set(credential_hash),
        failed_auth_attempts: Set(0),
        ..Default::default()
    };
    Customers::insert(customer)
        .on_conflict(
            OnConflict::column(customers::Column::OwnerIdentity)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(db_err)?;

    lock_customer(conn, owner_identity)
        .await?
        .ok_or_else(|| AccountError::CustomerNotFound(owner_identity.to_string()))
}

async fn insert_account<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    branch_id: Uuid,
    account_type: AccountType,
    system_role: Option<SystemRole>,
    settings: &LedgerSettings,
) -> Result<AccountId, AccountError> {
    let number = next_account_number(conn).await?;
    let id = AccountId::new();
    accounts::ActiveModel {
        id: Set(id.into_inner()),
        customer_id: Set(customer_id),
        branch_id: Set(branch_id),
        account_number: Set(number.as_string()),
        account_type: Set(account_type.into()),
        status: Set(db_enums::AccountStatus::Active),
        currency: Set(settings.currency.code().to_string()),
        balance: Set(Decimal::ZERO),
        system_role: Set(system_role.map(Into::into)),
        frozen_by_enforcement: Set(false),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(db_err)?;
    Ok(id)
}

async fn branch_by_code<C: ConnectionTrait>(
    conn: &C,
    code: &BranchCode,
) -> Result<Option<branches::Model>, LedgerError> {
    Branches::find()
        .filter(branches::Column::Code.eq(code.as_str()))
        .one(conn)
        .await
        .map_err(db_err)
}

/// Repository for customers, branches and accounts.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Creates a branch if it does not exist and returns it.
    pub async fn ensure_branch(
        &self,
        code: &BranchCode,
        name: &str,
    ) -> Result<branches::Model, AccountError> {
        let branch = branches::ActiveModel {
            id: Set(Uuid::now_v7()),
            code: Set(code.as_str().to_string()),
            name: Set(name.to_string()),
            ..Default::default()
        };
        Branches::insert(branch)
            .on_conflict(OnConflict::column(branches::Column::Code).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        branch_by_code(&self.db, code)
            .await?
            .ok_or_else(|| AccountError::BranchNotFound(code.to_string()))
    }

    /// Creates the system-owned counterparty accounts that are missing.
    ///
    /// Safe to call from several processes at start-up.
    pub async fn ensure_system_accounts(&self) -> Result<Vec<Account>, AccountError> {
        let branch = self.ensure_branch(&BranchCode::system(), "System").await?;
        let mut created = Vec::new();

        for role in SystemRole::ALL {
            if ledger::system_account_id(&self.db, role).await.is_ok() {
                continue;
            }
            let branch_id = branch.id;
            let result = retry::run(&self.settings.retry, "ensure_system_account", || async move {
                let txn = ledger::begin(&self.db, &self.settings).await?;
                let customer = ensure_customer(
                    &txn,
                    &role.owner_identity(),
                    role.display_name(),
                    UNUSABLE_CREDENTIAL.to_string(),
                )
                .await?;
                let id = insert_account(
                    &txn,
                    customer.id,
                    branch_id,
                    AccountType::Ordinary,
                    Some(role),
                    &self.settings,
                )
                .await?;
                txn.commit().await.map_err(db_err)?;
                Ok::<_, AccountError>(id)
            })
            .await;

            match result {
                Ok(id) => {
                    tracing::info!(role = %role, account_id = %id, "created system account");
                    created.extend(account_view(&self.db, id).await?);
                }
                // Another process created it first.
                Err(AccountError::Ledger(LedgerError::DuplicateOperation(_))) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }

    /// Opens an account, creating the customer on first open.
    pub async fn open_account(&self, request: &OpenAccountRequest) -> Result<Account, AccountError> {
        let owner = request.owner_identity.as_str();
        if owner.starts_with(SYSTEM_IDENTITY_PREFIX) {
            return Err(AccountError::ReservedIdentity(owner.to_string()));
        }

        let id = retry::run(&self.settings.retry, "open_account", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let branch = branch_by_code(&txn, &request.branch_code)
                .await?
                .ok_or_else(|| AccountError::BranchNotFound(request.branch_code.to_string()))?;

            let customer = match lock_customer(&txn, owner).await? {
                Some(customer) => customer,
                None => {
                    let hash = hash_pin(&request.credentials.pin)?;
                    ensure_customer(&txn, owner, &request.credentials.display_name, hash).await?
                }
            };

            let existing = Accounts::find()
                .filter(accounts::Column::CustomerId.eq(customer.id))
                .filter(accounts::Column::BranchId.eq(branch.id))
                .one(&txn)
                .await
                .map_err(db_err)?;
            if existing.is_some() {
                return Err(LedgerError::DuplicateOperation(format!(
                    "{owner} already has an account at branch {}",
                    request.branch_code
                ))
                .into());
            }

            let id = insert_account(
                &txn,
                customer.id,
                branch.id,
                request.account_type,
                None,
                &self.settings,
            )
            .await?;
            txn.commit().await.map_err(db_err)?;
            Ok::<_, AccountError>(id)
        })
        .await
        .inspect_err(|e| tracing::warn!(owner_identity = owner, error = %e, "open account rejected"))?;

        let account = account_view(&self.db, id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
        tracing::info!(
            account_id = %account.id,
            branch_code = %account.branch_code,
            account_number = %account.account_number,
            "opened account"
        );
        Ok(account)
    }

    /// The customer's primary account: the oldest one not closed.
    pub async fn get_account(&self, owner_identity: &str) -> Result<Option<Account>, AccountError> {
        let open = self
            .get_accounts(owner_identity)
            .await?
            .into_iter()
            .find(|a| a.status != AccountStatus::Closed);
        Ok(open)
    }

    /// Every account of the customer, oldest first.
    pub async fn get_accounts(&self, owner_identity: &str) -> Result<Vec<Account>, AccountError> {
        let rows = load_accounts(
            &self.db,
            account_query().filter(customers::Column::OwnerIdentity.eq(owner_identity)),
        )
        .await?;
        Ok(rows)
    }

    /// Account by id.
    pub async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        Ok(account_view(&self.db, id).await?)
    }

    /// Checks a customer's PIN.
    ///
    /// Unknown customers, system identities and locked credentials all
    /// answer `false`. Failures are counted; a success resets the count.
    pub async fn authenticate(&self, owner_identity: &str, secret: &str) -> Result<bool, AccountError> {
        if owner_identity.starts_with(SYSTEM_IDENTITY_PREFIX) {
            return Ok(false);
        }

        retry::run(&self.settings.retry, "authenticate", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let Some(customer) = lock_customer(&txn, owner_identity).await? else {
                return Ok(false);
            };
            if is_locked(customer.failed_auth_attempts) {
                tracing::warn!(owner_identity, "authentication locked");
                return Ok(false);
            }

            let verified = verify_pin(secret, &customer.credential_hash)?;
            let attempts = if verified { 0 } else { customer.failed_auth_attempts + 1 };
            if attempts != customer.failed_auth_attempts {
                let mut active = customer.into_active_model();
                active.failed_auth_attempts = Set(attempts);
                active.updated_at = Set(Utc::now().into());
                active.update(&txn).await.map_err(db_err)?;
            }
            txn.commit().await.map_err(db_err)?;

            if !verified {
                tracing::warn!(owner_identity, failed_attempts = attempts, "authentication failed");
            }
            Ok(verified)
        })
        .await
    }

    /// Replaces a customer's PIN and clears the failure counter.
    pub async fn reset_credentials(&self, owner_identity: &str, pin: &str) -> Result<(), AccountError> {
        if owner_identity.starts_with(SYSTEM_IDENTITY_PREFIX) {
            return Err(AccountError::ReservedIdentity(owner_identity.to_string()));
        }
        let hash = hash_pin(pin)?;

        let result = Customers::update_many()
            .filter(customers::Column::OwnerIdentity.eq(owner_identity))
            .col_expr(customers::Column::CredentialHash, Expr::value(hash))
            .col_expr(customers::Column::FailedAuthAttempts, Expr::value(0))
            .col_expr(customers::Column::UpdatedAt, Expr::current_timestamp().into())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(AccountError::CustomerNotFound(owner_identity.to_string()));
        }
        tracing::info!(owner_identity, "credentials reset");
        Ok(())
    }

    /// Closes an account with zero balance. Closed is terminal.
    pub async fn close_account(&self, id: AccountId) -> Result<Account, AccountError> {
        retry::run(&self.settings.retry, "close_account", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let row = Accounts::find_by_id(id.into_inner())
                .lock_exclusive()
                .one(&txn)
                .await
                .map_err(db_err)?
                .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
            if row.system_role.is_some() {
                return Err(LedgerError::InvalidAccountReference(format!(
                    "system account {id} cannot be closed"
                ))
                .into());
            }
            LedgerService::check_closable(&ledger::snapshot(&row)?)?;

            let mut active = row.into_active_model();
            active.status = Set(db_enums::AccountStatus::Closed);
            active.frozen_by_enforcement = Set(false);
            active.closed_at = Set(Some(Utc::now().into()));
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await.map_err(db_err)?;

            let account = account_view(&txn, id)
                .await?
                .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))?;
            txn.commit().await.map_err(db_err)?;
            tracing::info!(account_id = %id, "closed account");
            Ok::<_, AccountError>(account)
        })
        .await
        .inspect_err(|e| tracing::warn!(account_id = %id, error = %e, "close account rejected"))
    }
}
