//! Reference resolution and row locking.

use std::collections::HashMap;

use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::ledger::{AccountSnapshot, LedgerError, LedgerService};
use kinko_shared::types::AccountId;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait,
};

use super::convert::snapshot;
use crate::entities::{accounts, branches, sea_orm_active_enums};
use crate::error::db_err;

/// Accounts locked by the current unit of work.
#[derive(Debug, Default)]
pub struct LockedAccounts(HashMap<AccountId, AccountSnapshot>);

impl LockedAccounts {
    /// Snapshot of a locked account.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist.
    pub fn get(&self, id: AccountId) -> Result<&AccountSnapshot, LedgerError> {
        self.0
            .get(&id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Snapshots of every locked account, in lock order.
    pub fn snapshots(&self) -> Vec<&AccountSnapshot> {
        let mut all: Vec<&AccountSnapshot> = self.0.values().collect();
        all.sort_by_key(|s| s.id);
        all
    }
}

/// Resolves a reference to an account id without locking.
///
/// Id references are returned as is; their existence is checked when the
/// row is locked.
///
/// # Errors
///
/// Returns `AccountNotFound` for an unknown branch/number pair.
pub async fn resolve<C: ConnectionTrait>(
    conn: &C,
    reference: &AccountRef,
) -> Result<AccountId, LedgerError> {
    match reference {
        AccountRef::Id { account_id } => Ok(*account_id),
        AccountRef::Number {
            branch_code,
            account_number,
        } => accounts::Entity::find()
            .join(JoinType::InnerJoin, accounts::Relation::Branches.def())
            .filter(branches::Column::Code.eq(branch_code.as_str()))
            .filter(accounts::Column::AccountNumber.eq(account_number.as_string()))
            .one(conn)
            .await
            .map_err(db_err)?
            .map(|m| AccountId::from_uuid(m.id))
            .ok_or_else(|| LedgerError::AccountNotFound(reference.to_string())),
    }
}

/// Resolves many references, keeping per-reference failures.
pub async fn resolve_all<C: ConnectionTrait>(
    conn: &C,
    references: impl IntoIterator<Item = &AccountRef>,
) -> Result<Vec<Result<AccountId, LedgerError>>, LedgerError> {
    let mut resolved = Vec::new();
    for reference in references {
        match resolve(conn, reference).await {
            Err(err @ LedgerError::AccountNotFound(_)) => resolved.push(Err(err)),
            other => resolved.push(Ok(other?)),
        }
    }
    Ok(resolved)
}

/// Locks account rows with `SELECT ... FOR UPDATE`, one id at a time in
/// ascending order, and snapshots them. Unknown ids are left out.
pub async fn lock_accounts<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = AccountId>,
) -> Result<LockedAccounts, LedgerError> {
    let mut locked = HashMap::new();
    for id in LedgerService::lock_order(ids) {
        let row = accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(db_err)?;
        if let Some(model) = row {
            locked.insert(id, snapshot(&model)?);
        }
    }
    Ok(LockedAccounts(locked))
}

/// Id of the system account with `role`.
///
/// # Errors
///
/// Returns `AccountNotFound` if system accounts have not been created.
pub async fn system_account_id<C: ConnectionTrait>(
    conn: &C,
    role: SystemRole,
) -> Result<AccountId, LedgerError> {
    accounts::Entity::find()
        .filter(accounts::Column::SystemRole.eq(sea_orm_active_enums::SystemRole::from(role)))
        .one(conn)
        .await
        .map_err(db_err)?
        .map(|m| AccountId::from_uuid(m.id))
        .ok_or_else(|| LedgerError::AccountNotFound(role.owner_identity()))
}
