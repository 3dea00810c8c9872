//! Chip sub-ledger repository.
//!
//! Chip balances change in the same database transaction as the cash that
//! backs them. Account rows are always locked before chip rows, and chip
//! rows of several customers in ascending customer id order.
//!
//! Journal deltas record the change of *available* chips, so the sum of a
//! customer's journal equals their available base and bonus chips.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use kinko_core::account::{AccountRef, SystemRole};
use kinko_core::chips::{
    ChipBalance, ChipError, ChipPolicy, ChipService, ChipTransactionKind, LockRequest, LockSplit,
};
use kinko_core::ledger::{Initiator, LedgerError, TransactionRecord, TransferKind, TransferRequest};
use kinko_core::tax::{IncomeSource, TaxError};
use kinko_shared::types::AccountId;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

use super::account::{find_customer, lock_customer, owned_account};
use super::tax::record_income_in;
use crate::entities::prelude::*;
use crate::entities::sea_orm_active_enums::ChipLockStatus;
use crate::entities::{chip_balances, chip_locks, chip_transactions, customers};
use crate::error::db_err;
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// Chip balance after a movement that also moved cash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChipReceipt {
    /// Chip balance after the movement.
    pub balance: ChipBalance,
    /// The backing cash transaction.
    pub transaction: TransactionRecord,
}

/// One line of the chip journal.
struct JournalLine<'a> {
    customer_id: Uuid,
    kind: ChipTransactionKind,
    base_delta: i64,
    bonus_delta: i64,
    game_session_id: Option<&'a str>,
    counterparty_customer_id: Option<Uuid>,
    ledger_transaction_id: Option<Uuid>,
    description: Option<String>,
}

impl<'a> JournalLine<'a> {
    fn new(customer_id: Uuid, kind: ChipTransactionKind, base_delta: i64, bonus_delta: i64) -> Self {
        Self {
            customer_id,
            kind,
            base_delta,
            bonus_delta,
            game_session_id: None,
            counterparty_customer_id: None,
            ledger_transaction_id: None,
            description: None,
        }
    }

    fn session(mut self, session: &'a str) -> Self {
        self.game_session_id = Some(session);
        self
    }

    async fn insert<C: ConnectionTrait>(self, conn: &C) -> Result<(), ChipError> {
        chip_transactions::ActiveModel {
            id: Set(Uuid::now_v7()),
            customer_id: Set(self.customer_id),
            kind: Set(self.kind.into()),
            base_delta: Set(self.base_delta),
            bonus_delta: Set(self.bonus_delta),
            game_session_id: Set(self.game_session_id.map(str::to_string)),
            counterparty_customer_id: Set(self.counterparty_customer_id),
            ledger_transaction_id: Set(self.ledger_transaction_id),
            description: Set(self.description),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

const fn to_balance(model: &chip_balances::Model) -> ChipBalance {
    ChipBalance {
        base: model.base_balance,
        bonus: model.bonus_balance,
        locked_base: model.locked_base_balance,
        locked_bonus: model.locked_bonus_balance,
    }
}

const fn to_split(model: &chip_locks::Model) -> LockSplit {
    LockSplit {
        base: model.locked_base,
        bonus: model.locked_bonus,
    }
}

/// Gambling income always has a source id and a positive amount, so only a
/// ledger failure is expected here.
fn income_err(err: TaxError) -> ChipError {
    match err {
        TaxError::Ledger(e) => ChipError::Ledger(e),
        other => ChipError::Ledger(LedgerError::Internal(other.to_string())),
    }
}

async fn customer_id<C: ConnectionTrait>(conn: &C, owner_identity: &str) -> Result<Uuid, ChipError> {
    find_customer(conn, owner_identity)
        .await?
        .map(|c| c.id)
        .ok_or_else(|| ChipError::CustomerNotFound(owner_identity.to_string()))
}

/// Locks a customer's chip row, creating an empty one first if needed.
async fn lock_balance<C: ConnectionTrait>(conn: &C, customer_id: Uuid) -> Result<ChipBalance, ChipError> {
    ChipBalances::insert(chip_balances::ActiveModel {
        customer_id: Set(customer_id),
        base_balance: Set(0),
        bonus_balance: Set(0),
        locked_base_balance: Set(0),
        locked_bonus_balance: Set(0),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(chip_balances::Column::CustomerId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await
    .map_err(db_err)?;

    let row = ChipBalances::find_by_id(customer_id)
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| LedgerError::Internal(format!("chip balance of {customer_id} vanished")))?;
    Ok(to_balance(&row))
}

async fn save_balance<C: ConnectionTrait>(
    conn: &C,
    customer_id: Uuid,
    balance: ChipBalance,
) -> Result<(), ChipError> {
    chip_balances::ActiveModel {
        customer_id: Set(customer_id),
        base_balance: Set(balance.base),
        bonus_balance: Set(balance.bonus),
        locked_base_balance: Set(balance.locked_base),
        locked_bonus_balance: Set(balance.locked_bonus),
        updated_at: Set(Utc::now().into()),
    }
    .update(conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Repository for the chip economy.
#[derive(Debug, Clone)]
pub struct ChipRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
    policy: ChipPolicy,
}

impl ChipRepository {
    /// Creates a new chip repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings, policy: ChipPolicy) -> Self {
        Self { db, settings, policy }
    }

    /// Current chip balance. Customers who never held chips have zeroes.
    pub async fn get_chip_balance(&self, owner_identity: &str) -> Result<ChipBalance, ChipError> {
        let id = customer_id(&self.db, owner_identity).await?;
        let row = ChipBalances::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(row.as_ref().map(to_balance).unwrap_or_default())
    }

    /// Buys base chips with cash from one of the customer's accounts.
    pub async fn purchase_chips(
        &self,
        owner_identity: &str,
        from: &AccountRef,
        chips: i64,
    ) -> Result<ChipReceipt, ChipError> {
        ChipService::validate_amount(chips)?;
        let price = ChipService::purchase_price(&self.policy, chips);

        retry::run(&self.settings.retry, "purchase_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = customer_id(&txn, owner_identity).await?;
            let from_id = owned_account(&txn, customer, from).await?;
            let shop = ledger::system_account_id(&txn, SystemRole::ChipShop).await?;

            let transaction = ledger::transfer(
                &txn,
                &TransferRequest {
                    from: AccountRef::id(from_id),
                    to: AccountRef::id(shop),
                    amount: price,
                    currency: self.settings.currency,
                    description: Some(format!("Chip purchase: {chips} chips")),
                    kind: TransferKind::Transfer,
                    initiator: Initiator::Customer,
                },
            )
            .await?;

            let balance = ChipService::credit_base(lock_balance(&txn, customer).await?, chips)?;
            save_balance(&txn, customer, balance).await?;
            JournalLine {
                ledger_transaction_id: Some(transaction.id.into_inner()),
                ..JournalLine::new(customer, ChipTransactionKind::Purchase, chips, 0)
            }
            .insert(&txn)
            .await?;

            txn.commit().await.map_err(db_err)?;
            tracing::info!(owner_identity, chips, price = %price, "purchased chips");
            Ok(ChipReceipt { balance, transaction })
        })
        .await
    }

    /// Grants promotional bonus chips. Bonus chips are use-only.
    pub async fn grant_bonus_chips(
        &self,
        owner_identity: &str,
        chips: i64,
        reason: &str,
    ) -> Result<ChipBalance, ChipError> {
        ChipService::validate_amount(chips)?;

        retry::run(&self.settings.retry, "grant_bonus_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = customer_id(&txn, owner_identity).await?;
            let balance = ChipService::credit_bonus(lock_balance(&txn, customer).await?, chips)?;
            save_balance(&txn, customer, balance).await?;
            JournalLine {
                description: Some(reason.to_string()),
                ..JournalLine::new(customer, ChipTransactionKind::Bonus, 0, chips)
            }
            .insert(&txn)
            .await?;
            txn.commit().await.map_err(db_err)?;
            tracing::info!(owner_identity, chips, reason, "granted bonus chips");
            Ok(balance)
        })
        .await
    }

    /// Commits chips of every participant to a round, or of none.
    pub async fn lock_chips(
        &self,
        game_session_id: &str,
        participants: &[LockRequest],
    ) -> Result<Vec<chip_locks::Model>, ChipError> {
        if participants.is_empty() {
            return Err(ChipError::SessionNotFound(game_session_id.to_string()));
        }

        retry::run(&self.settings.retry, "lock_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;

            let mut ids = Vec::with_capacity(participants.len());
            for p in participants {
                ids.push(customer_id(&txn, &p.owner_identity).await?);
            }
            let mut lock_order = ids.clone();
            lock_order.sort_unstable();
            lock_order.dedup();
            let mut balances = HashMap::new();
            for id in lock_order {
                balances.insert(id, lock_balance(&txn, id).await?);
            }

            let plan: Vec<(String, ChipBalance, i64)> = participants
                .iter()
                .zip(&ids)
                .map(|(p, id)| {
                    let balance = balances.get(id).copied().unwrap_or_default();
                    (p.owner_identity.clone(), balance, p.amount)
                })
                .collect();
            let splits = ChipService::plan_lock_batch(&plan)
                .inspect_err(|e| tracing::warn!(game_session_id, error = %e, "chip lock rejected"))?;

            let mut locks = Vec::with_capacity(splits.len());
            for (id, split) in ids.iter().zip(splits) {
                let balance = balances.get(id).copied().unwrap_or_default();
                save_balance(&txn, *id, ChipService::apply_lock(balance, split)).await?;
                let lock = chip_locks::ActiveModel {
                    game_session_id: Set(game_session_id.to_string()),
                    customer_id: Set(*id),
                    locked_base: Set(split.base),
                    locked_bonus: Set(split.bonus),
                    status: Set(ChipLockStatus::Held),
                    payout: Set(None),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
                JournalLine::new(*id, ChipTransactionKind::Lock, -split.base, -split.bonus)
                    .session(game_session_id)
                    .insert(&txn)
                    .await?;
                locks.push(lock);
            }

            txn.commit().await.map_err(db_err)?;
            tracing::info!(game_session_id, participants = locks.len(), "locked chips");
            Ok(locks)
        })
        .await
    }

    /// Settles a round.
    ///
    /// Held participants missing from `payouts` settle with a payout of zero.
    /// Winners' net gains are recorded as gambling income on `today`.
    /// Already settled or released locks are skipped, so a replay changes
    /// nothing.
    pub async fn distribute_chips(
        &self,
        game_session_id: &str,
        payouts: &HashMap<String, i64>,
        today: NaiveDate,
    ) -> Result<Vec<chip_locks::Model>, ChipError> {
        if let Some(negative) = payouts.values().find(|p| **p < 0) {
            return Err(ChipError::InvalidAmount(*negative));
        }

        retry::run(&self.settings.retry, "distribute_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let locks = self.session_locks(&txn, game_session_id).await?;

            let mut payout_by_customer = HashMap::new();
            for (owner, payout) in payouts {
                let id = find_customer(&txn, owner).await?.map(|c| c.id);
                match id.filter(|id| locks.iter().any(|(l, _)| l.customer_id == *id)) {
                    Some(id) => {
                        payout_by_customer.insert(id, *payout);
                    }
                    None => {
                        return Err(ChipError::NotInSession {
                            owner_identity: owner.clone(),
                            session: game_session_id.to_string(),
                        });
                    }
                }
            }

            let mut settled = Vec::new();
            for (lock, owner) in locks {
                if lock.status != ChipLockStatus::Held {
                    continue;
                }
                let split = to_split(&lock);
                let payout = payout_by_customer.get(&lock.customer_id).copied().unwrap_or(0);
                let balance = lock_balance(&txn, lock.customer_id).await?;
                save_balance(
                    &txn,
                    lock.customer_id,
                    ChipService::apply_settlement(balance, split, payout)?,
                )
                .await?;
                JournalLine::new(lock.customer_id, ChipTransactionKind::Settlement, payout, 0)
                    .session(game_session_id)
                    .insert(&txn)
                    .await?;

                if let Some(income) = ChipService::gambling_income(&self.policy, split, payout) {
                    record_income_in(
                        &txn,
                        lock.customer_id,
                        IncomeSource::Gambling,
                        &format!("{game_session_id}:{}", lock.customer_id),
                        income,
                        today,
                    )
                    .await
                    .map_err(income_err)?;
                }

                let settled_customer = lock.customer_id;
                let mut active = lock.into_active_model();
                active.status = Set(ChipLockStatus::Settled);
                active.payout = Set(Some(payout));
                active.settled_at = Set(Some(Utc::now().into()));
                settled.push(active.update(&txn).await.map_err(db_err)?);
                tracing::debug!(game_session_id, customer_id = %settled_customer, owner_identity = %owner, payout, "settled chips");
            }

            txn.commit().await.map_err(db_err)?;
            tracing::info!(game_session_id, settled = settled.len(), "distributed chips");
            Ok(settled)
        })
        .await
    }

    /// Cancels an unsettled round and returns every held chip.
    pub async fn release_chips(&self, game_session_id: &str) -> Result<Vec<chip_locks::Model>, ChipError> {
        retry::run(&self.settings.retry, "release_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let locks = self.session_locks(&txn, game_session_id).await?;

            let mut released = Vec::new();
            for (lock, _) in locks {
                if lock.status != ChipLockStatus::Held {
                    continue;
                }
                let split = to_split(&lock);
                let balance = lock_balance(&txn, lock.customer_id).await?;
                save_balance(&txn, lock.customer_id, ChipService::apply_release(balance, split)).await?;
                JournalLine::new(lock.customer_id, ChipTransactionKind::Release, split.base, split.bonus)
                    .session(game_session_id)
                    .insert(&txn)
                    .await?;

                let mut active = lock.into_active_model();
                active.status = Set(ChipLockStatus::Released);
                active.settled_at = Set(Some(Utc::now().into()));
                released.push(active.update(&txn).await.map_err(db_err)?);
            }

            txn.commit().await.map_err(db_err)?;
            tracing::info!(game_session_id, released = released.len(), "released chips");
            Ok(released)
        })
        .await
    }

    /// Sends base chips to another customer. Bonus chips never move.
    pub async fn transfer_chips(
        &self,
        from_owner: &str,
        to_owner: &str,
        chips: i64,
    ) -> Result<ChipBalance, ChipError> {
        if from_owner == to_owner {
            return Err(ChipError::SelfTransfer);
        }
        ChipService::validate_amount(chips)?;

        retry::run(&self.settings.retry, "transfer_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let from = customer_id(&txn, from_owner).await?;
            let to = customer_id(&txn, to_owner).await?;

            let (first, second) = if from < to { (from, to) } else { (to, from) };
            let first_balance = lock_balance(&txn, first).await?;
            let second_balance = lock_balance(&txn, second).await?;
            let (from_balance, to_balance) = if first == from {
                (first_balance, second_balance)
            } else {
                (second_balance, first_balance)
            };

            let from_balance = ChipService::debit_base(from_owner, from_balance, chips)
                .inspect_err(|e| tracing::warn!(from_owner, to_owner, error = %e, "chip transfer rejected"))?;
            let to_balance = ChipService::credit_base(to_balance, chips)?;
            save_balance(&txn, from, from_balance).await?;
            save_balance(&txn, to, to_balance).await?;

            JournalLine {
                counterparty_customer_id: Some(to),
                ..JournalLine::new(from, ChipTransactionKind::TransferOut, -chips, 0)
            }
            .insert(&txn)
            .await?;
            JournalLine {
                counterparty_customer_id: Some(from),
                ..JournalLine::new(to, ChipTransactionKind::TransferIn, chips, 0)
            }
            .insert(&txn)
            .await?;

            txn.commit().await.map_err(db_err)?;
            tracing::info!(from_owner, to_owner, chips, "transferred chips");
            Ok(from_balance)
        })
        .await
    }

    /// Sets the account redemptions are paid into.
    pub async fn register_redemption_account(
        &self,
        owner_identity: &str,
        account: &AccountRef,
    ) -> Result<customers::Model, ChipError> {
        retry::run(&self.settings.retry, "register_redemption_account", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = lock_customer(&txn, owner_identity)
                .await?
                .ok_or_else(|| ChipError::CustomerNotFound(owner_identity.to_string()))?;
            let account_id = owned_account(&txn, customer.id, account).await?;

            let mut active = customer.into_active_model();
            active.redemption_account_id = Set(Some(account_id.into_inner()));
            active.updated_at = Set(Utc::now().into());
            let customer = active.update(&txn).await.map_err(db_err)?;
            txn.commit().await.map_err(db_err)?;
            tracing::info!(owner_identity, account_id = %account_id, "registered redemption account");
            Ok(customer)
        })
        .await
    }

    /// Exchanges base chips for cash paid by the chip shop.
    pub async fn redeem_chips(&self, owner_identity: &str, chips: i64) -> Result<ChipReceipt, ChipError> {
        ChipService::validate_amount(chips)?;
        let value = ChipService::redemption_value(&self.policy, chips);

        retry::run(&self.settings.retry, "redeem_chips", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let customer = find_customer(&txn, owner_identity)
                .await?
                .ok_or_else(|| ChipError::CustomerNotFound(owner_identity.to_string()))?;
            let destination = customer
                .redemption_account_id
                .ok_or_else(|| ChipError::NoRedemptionAccount(owner_identity.to_string()))?;
            let shop = ledger::system_account_id(&txn, SystemRole::ChipShop).await?;

            let transaction = ledger::transfer(
                &txn,
                &TransferRequest {
                    from: AccountRef::id(shop),
                    to: AccountRef::id(AccountId::from_uuid(destination)),
                    amount: value,
                    currency: self.settings.currency,
                    description: Some(format!("Chip redemption: {chips} chips")),
                    kind: TransferKind::Transfer,
                    initiator: Initiator::Customer,
                },
            )
            .await?;

            let balance = lock_balance(&txn, customer.id).await?;
            let balance = ChipService::debit_base(owner_identity, balance, chips)
                .inspect_err(|e| tracing::warn!(owner_identity, error = %e, "redemption rejected"))?;
            save_balance(&txn, customer.id, balance).await?;
            JournalLine {
                ledger_transaction_id: Some(transaction.id.into_inner()),
                ..JournalLine::new(customer.id, ChipTransactionKind::Redeem, -chips, 0)
            }
            .insert(&txn)
            .await?;

            txn.commit().await.map_err(db_err)?;
            tracing::info!(owner_identity, chips, value = %value, "redeemed chips");
            Ok(ChipReceipt { balance, transaction })
        })
        .await
    }

    /// Locks the session's lock rows in customer order, with owner identities.
    async fn session_locks<C: ConnectionTrait>(
        &self,
        conn: &C,
        game_session_id: &str,
    ) -> Result<Vec<(chip_locks::Model, String)>, ChipError> {
        let locks = ChipLocks::find()
            .filter(chip_locks::Column::GameSessionId.eq(game_session_id))
            .order_by_asc(chip_locks::Column::CustomerId)
            .lock_exclusive()
            .all(conn)
            .await
            .map_err(db_err)?;
        if locks.is_empty() {
            return Err(ChipError::SessionNotFound(game_session_id.to_string()));
        }

        let ids: Vec<Uuid> = locks.iter().map(|l| l.customer_id).collect();
        let owners: HashMap<Uuid, String> = Customers::find()
            .filter(customers::Column::Id.is_in(ids))
            .all(conn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|c| (c.id, c.owner_identity))
            .collect();

        Ok(locks
            .into_iter()
            .map(|l| {
                let owner = owners.get(&l.customer_id).cloned().unwrap_or_default();
                (l, owner)
            })
            .collect())
    }
}
