//! Ledger service: plans money movements against locked account snapshots.
//!
//! The database layer resolves references, locks rows in `lock_order`, reads
//! snapshots and hands them here. Every check runs on the locked state, and
//! the returned plans are what it persists.

use std::collections::HashMap;

use kinko_shared::types::{AccountId, Money};
use rust_decimal::Decimal;

use super::entry::PlannedEntry;
use super::error::LedgerError;
use super::types::{
    AccountSnapshot, AccountStatus, BatchDirection, BatchTransferRequest, Initiator, LegFailure,
    MAX_HISTORY_LIMIT, MovementRequest, PostingPlan, TransactionRecord, TransactionType,
    TransferRequest,
};
use super::validation::{check_credit, check_debit, validate_amount};

/// Default page size for history queries.
pub const DEFAULT_HISTORY_LIMIT: u64 = 20;

/// Ledger service for planning and validating money movements.
///
/// Pure business logic with no database dependencies.
pub struct LedgerService;

impl LedgerService {
    /// Deterministic lock order: ascending id, duplicates removed.
    ///
    /// Every unit of work locks account rows in this order, so two units of
    /// work touching overlapping accounts can never wait on each other in a
    /// cycle.
    #[must_use]
    pub fn lock_order(ids: impl IntoIterator<Item = AccountId>) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Plans a two-sided transfer.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `InvalidAccountReference` (same account on both
    /// sides), `AccountNotUsable`, `CurrencyMismatch`, `InsufficientFunds`.
    pub fn plan_transfer(
        request: &TransferRequest,
        from: &AccountSnapshot,
        to: &AccountSnapshot,
    ) -> Result<PostingPlan, LedgerError> {
        let money = validate_amount(request.amount, request.currency)?;
        if from.id == to.id {
            return Err(LedgerError::InvalidAccountReference(
                "cannot transfer to the same account".to_string(),
            ));
        }
        check_debit(from, money, from.balance, request.initiator)?;
        check_credit(to, money, to.balance)?;

        Ok(Self::two_sided(
            request.kind.into(),
            from.id,
            to.id,
            money,
            request.description.clone(),
        ))
    }

    /// Plans a single-sided deposit. Frozen accounts accept deposits.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `AccountNotUsable` (closed), `CurrencyMismatch`.
    pub fn plan_deposit(
        request: &MovementRequest,
        account: &AccountSnapshot,
    ) -> Result<PostingPlan, LedgerError> {
        let money = validate_amount(request.amount, request.currency)?;
        check_credit(account, money, account.balance)?;
        Ok(Self::single_sided(
            TransactionType::Deposit,
            account.id,
            money,
            request.description.clone(),
        ))
    }

    /// Plans a single-sided withdrawal.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `AccountNotUsable`, `CurrencyMismatch`, `InsufficientFunds`.
    pub fn plan_withdrawal(
        request: &MovementRequest,
        account: &AccountSnapshot,
    ) -> Result<PostingPlan, LedgerError> {
        let money = validate_amount(request.amount, request.currency)?;
        check_debit(account, money, account.balance, request.initiator)?;
        Ok(Self::single_sided(
            TransactionType::Withdrawal,
            account.id,
            money,
            request.description.clone(),
        ))
    }

    /// Plans a batch against running balances.
    ///
    /// `legs[i]` is the resolved snapshot for `request.legs[i]`, or the
    /// resolution error. Either every leg yields a plan, or the result lists
    /// every failing leg and nothing may be applied.
    ///
    /// # Errors
    ///
    /// Returns every failing leg with its reason.
    pub fn plan_batch(
        request: &BatchTransferRequest,
        legs: &[Result<AccountSnapshot, LedgerError>],
        counterparty: Option<&AccountSnapshot>,
    ) -> Result<Vec<PostingPlan>, Vec<LegFailure>> {
        let mut running: HashMap<AccountId, Decimal> = HashMap::new();
        let mut plans = Vec::with_capacity(legs.len());
        let mut failures = Vec::new();

        for (index, (leg, resolved)) in request.legs.iter().zip(legs).enumerate() {
            let planned = resolved.clone().and_then(|account| {
                Self::plan_leg(request, &account, leg.amount, counterparty, &mut running)
            });
            match planned {
                Ok(plan) => plans.push(plan),
                Err(error) => failures.push(LegFailure {
                    index,
                    account: leg.account.clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(plans)
        } else {
            Err(failures)
        }
    }

    fn plan_leg(
        request: &BatchTransferRequest,
        account: &AccountSnapshot,
        amount: Decimal,
        counterparty: Option<&AccountSnapshot>,
        running: &mut HashMap<AccountId, Decimal>,
    ) -> Result<PostingPlan, LedgerError> {
        let money = validate_amount(amount, request.currency)?;
        let description = request.description.clone();

        let (debited, credited) = match (request.direction, counterparty) {
            (BatchDirection::Withdraw, Some(other)) => (Some(account), Some(other)),
            (BatchDirection::Deposit, Some(other)) => (Some(other), Some(account)),
            (BatchDirection::Withdraw, None) => (Some(account), None),
            (BatchDirection::Deposit, None) => (None, Some(account)),
        };

        if counterparty.is_some_and(|c| c.id == account.id) {
            return Err(LedgerError::InvalidAccountReference(format!(
                "leg account {} is the batch counterparty",
                account.id
            )));
        }

        let debit = match debited {
            Some(debited) => {
                let available = *running.get(&debited.id).unwrap_or(&debited.balance);
                check_debit(debited, money, available, request.initiator)?;
                let remaining = available
                    .checked_sub(money.amount)
                    .ok_or(LedgerError::InvalidAmount(money.amount))?;
                Some((debited.id, remaining))
            }
            None => None,
        };
        let credit = match credited {
            Some(credited) => {
                let current = *running.get(&credited.id).unwrap_or(&credited.balance);
                check_credit(credited, money, current)?;
                let total = current
                    .checked_add(money.amount)
                    .ok_or(LedgerError::InvalidAmount(money.amount))?;
                Some((credited.id, total))
            }
            None => None,
        };

        // Only commit running balances once every check for the leg passed.
        running.extend(debit.into_iter().chain(credit));

        Ok(match (debited, credited) {
            (Some(from), Some(to)) => {
                Self::two_sided(TransactionType::Transfer, from.id, to.id, money, description)
            }
            (Some(from), None) => {
                Self::single_sided(TransactionType::Withdrawal, from.id, money, description)
            }
            (None, Some(to)) => {
                Self::single_sided(TransactionType::Deposit, to.id, money, description)
            }
            (None, None) => {
                return Err(LedgerError::Internal("batch leg without accounts".to_string()));
            }
        })
    }

    /// Plans the reversal of a completed transaction.
    ///
    /// The reversal has the same type and amount with the sides swapped.
    /// `debit_side` is the original credited account and `credit_side` the
    /// original debited account. Reversals are system flows, so a frozen
    /// account may be debited; closed accounts still reject.
    ///
    /// # Errors
    ///
    /// `NotReversible` if the original is not completed or is itself a
    /// reversal; otherwise the usual debit/credit checks.
    pub fn plan_reversal(
        original: &TransactionRecord,
        debit_side: Option<&AccountSnapshot>,
        credit_side: Option<&AccountSnapshot>,
        reason: &str,
    ) -> Result<PostingPlan, LedgerError> {
        if !original.status.is_reversible() || original.reverses_transaction_id.is_some() {
            return Err(LedgerError::NotReversible(original.id));
        }
        if debit_side.map(|a| a.id) != original.to_account_id
            || credit_side.map(|a| a.id) != original.from_account_id
        {
            return Err(LedgerError::Internal(
                "reversal snapshots do not match the original transaction".to_string(),
            ));
        }

        let money = Money::new(original.amount, original.currency);
        let mut entries = Vec::with_capacity(2);
        if let Some(account) = debit_side {
            check_debit(account, money, account.balance, Initiator::System)?;
            entries.push(PlannedEntry::debit(account.id, money.amount));
        }
        if let Some(account) = credit_side {
            check_credit(account, money, account.balance)?;
            entries.push(PlannedEntry::credit(account.id, money.amount));
        }

        Ok(PostingPlan {
            transaction_type: original.transaction_type.mirrored(),
            from_account_id: original.to_account_id,
            to_account_id: original.from_account_id,
            amount: money.amount,
            currency: money.currency,
            description: Some(format!("Reversal of {}: {reason}", original.id)),
            reverses: Some(original.id),
            entries,
        })
    }

    /// Checks that an account may be closed.
    ///
    /// # Errors
    ///
    /// `AccountNotUsable` if already closed, `BalanceRemaining` if funded.
    pub fn check_closable(account: &AccountSnapshot) -> Result<(), LedgerError> {
        if account.status == AccountStatus::Closed {
            return Err(LedgerError::AccountNotUsable {
                account: account.id,
                status: account.status,
            });
        }
        if !account.balance.is_zero() {
            return Err(LedgerError::BalanceRemaining(account.id));
        }
        Ok(())
    }

    /// Status after an enforcement freeze or unfreeze. Closed never changes.
    #[must_use]
    pub const fn next_enforcement_status(current: AccountStatus, freeze: bool) -> AccountStatus {
        match (current, freeze) {
            (AccountStatus::Closed, _) => AccountStatus::Closed,
            (_, true) => AccountStatus::Frozen,
            (_, false) => AccountStatus::Active,
        }
    }

    /// Clamps a caller-supplied history page size.
    #[must_use]
    pub fn history_limit(limit: Option<u64>) -> u64 {
        limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT)
    }

    fn two_sided(
        transaction_type: TransactionType,
        from: AccountId,
        to: AccountId,
        money: Money,
        description: Option<String>,
    ) -> PostingPlan {
        PostingPlan {
            transaction_type,
            from_account_id: Some(from),
            to_account_id: Some(to),
            amount: money.amount,
            currency: money.currency,
            description,
            reverses: None,
            entries: vec![
                PlannedEntry::debit(from, money.amount),
                PlannedEntry::credit(to, money.amount),
            ],
        }
    }

    fn single_sided(
        transaction_type: TransactionType,
        account: AccountId,
        money: Money,
        description: Option<String>,
    ) -> PostingPlan {
        let (from, to, entry) = match transaction_type {
            TransactionType::Withdrawal => {
                (Some(account), None, PlannedEntry::debit(account, money.amount))
            }
            _ => (None, Some(account), PlannedEntry::credit(account, money.amount)),
        };
        PostingPlan {
            transaction_type,
            from_account_id: from,
            to_account_id: to,
            amount: money.amount,
            currency: money.currency,
            description,
            reverses: None,
            entries: vec![entry],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountRef;
    use crate::ledger::types::{BatchLeg, TransactionStatus, TransferKind};
    use crate::ledger::validation::validate_entries;
    use kinko_shared::types::{Currency, TransactionId};
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            id: AccountId::new(),
            currency: Currency::Jpy,
            status: AccountStatus::Active,
            balance,
        }
    }

    fn transfer(from: &AccountSnapshot, to: &AccountSnapshot, amount: Decimal) -> TransferRequest {
        TransferRequest {
            from: AccountRef::id(from.id),
            to: AccountRef::id(to.id),
            amount,
            currency: Currency::Jpy,
            description: None,
            kind: TransferKind::Transfer,
            initiator: Initiator::Customer,
        }
    }

    fn batch(legs: &[&AccountSnapshot], amounts: &[Decimal], direction: BatchDirection) -> BatchTransferRequest {
        BatchTransferRequest {
            legs: legs
                .iter()
                .zip(amounts)
                .map(|(a, amount)| BatchLeg {
                    account: AccountRef::id(a.id),
                    amount: *amount,
                })
                .collect(),
            direction,
            currency: Currency::Jpy,
            counterparty: None,
            description: Some("round 7 payout".to_string()),
            initiator: Initiator::Customer,
        }
    }

    #[test]
    fn test_transfer_plan() {
        let a = account(dec!(5000));
        let b = account(dec!(0));
        let plan = LedgerService::plan_transfer(&transfer(&a, &b, dec!(3000)), &a, &b).unwrap();

        assert_eq!(plan.transaction_type, TransactionType::Transfer);
        assert_eq!(plan.from_account_id, Some(a.id));
        assert_eq!(plan.to_account_id, Some(b.id));
        assert!(validate_entries(&plan.entries, true).is_ok());
        assert_eq!(
            plan.balance_changes(),
            vec![(a.id, dec!(-3000)), (b.id, dec!(3000))]
        );
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let a = account(dec!(100));
        let b = account(dec!(0));
        let err = LedgerService::plan_transfer(&transfer(&a, &b, dec!(500)), &a, &b).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                account: a.id,
                available: dec!(100),
                requested: dec!(500),
            }
        );
    }

    #[test]
    fn test_transfer_from_closed_account() {
        let mut a = account(dec!(5000));
        a.status = AccountStatus::Closed;
        let b = account(dec!(0));
        assert!(matches!(
            LedgerService::plan_transfer(&transfer(&a, &b, dec!(1)), &a, &b),
            Err(LedgerError::AccountNotUsable { .. })
        ));
    }

    #[test]
    fn test_transfer_to_self_rejected() {
        let a = account(dec!(5000));
        assert!(matches!(
            LedgerService::plan_transfer(&transfer(&a, &a, dec!(1)), &a, &a),
            Err(LedgerError::InvalidAccountReference(_))
        ));
    }

    #[test]
    fn test_fee_kind_recorded() {
        let a = account(dec!(5000));
        let b = account(dec!(0));
        let mut request = transfer(&a, &b, dec!(10));
        request.kind = TransferKind::Fee;
        let plan = LedgerService::plan_transfer(&request, &a, &b).unwrap();
        assert_eq!(plan.transaction_type, TransactionType::Fee);
    }

    #[test]
    fn test_frozen_account_accepts_deposit_rejects_withdrawal() {
        let mut a = account(dec!(1000));
        a.status = AccountStatus::Frozen;
        let request = MovementRequest {
            account: AccountRef::id(a.id),
            amount: dec!(100),
            currency: Currency::Jpy,
            description: None,
            initiator: Initiator::Customer,
        };
        let deposit = LedgerService::plan_deposit(&request, &a).unwrap();
        assert_eq!(deposit.to_account_id, Some(a.id));
        assert_eq!(deposit.from_account_id, None);
        assert!(validate_entries(&deposit.entries, false).is_ok());

        assert!(matches!(
            LedgerService::plan_withdrawal(&request, &a),
            Err(LedgerError::AccountNotUsable { .. })
        ));
    }

    #[test]
    fn test_batch_lists_every_failing_leg() {
        let a = account(dec!(1000));
        let b = account(dec!(10));
        let c = account(dec!(5));
        let request = batch(&[&a, &b, &c], &[dec!(100), dec!(100), dec!(100)], BatchDirection::Withdraw);
        let legs = vec![Ok(a.clone()), Ok(b.clone()), Ok(c.clone())];

        let failures = LedgerService::plan_batch(&request, &legs, None).unwrap_err();
        let failed: Vec<usize> = failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 2]);
    }

    #[test]
    fn test_batch_running_balance_for_repeated_account() {
        let a = account(dec!(150));
        let request = batch(&[&a, &a], &[dec!(100), dec!(100)], BatchDirection::Withdraw);
        let legs = vec![Ok(a.clone()), Ok(a.clone())];

        let failures = LedgerService::plan_batch(&request, &legs, None).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
    }

    #[test]
    fn test_batch_deposits_past_balance_limit_rejected() {
        let a = account(dec!(0));
        let huge = Decimal::MAX - dec!(1);
        let request = batch(&[&a, &a], &[huge, huge], BatchDirection::Deposit);
        let legs = vec![Ok(a.clone()), Ok(a.clone())];
        let failures = LedgerService::plan_batch(&request, &legs, None).unwrap_err();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| matches!(f.error, LedgerError::InvalidAmount(_))));

        // Each leg fits on its own; the second one would push the balance over.
        let half = dec!(600_000_000_000_000);
        let request = batch(&[&a, &a], &[half, half], BatchDirection::Deposit);
        let legs = vec![Ok(a.clone()), Ok(a)];
        let failures = LedgerService::plan_batch(&request, &legs, None).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].error, LedgerError::InvalidAmount(half));
    }

    #[test]
    fn test_batch_with_counterparty_deposit() {
        let shop = account(dec!(250));
        let a = account(dec!(0));
        let b = account(dec!(0));
        let mut request = batch(&[&a, &b], &[dec!(100), dec!(100)], BatchDirection::Deposit);
        request.counterparty = Some(AccountRef::id(shop.id));
        let legs = vec![Ok(a.clone()), Ok(b.clone())];

        let plans = LedgerService::plan_batch(&request, &legs, Some(&shop)).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|p| p.from_account_id == Some(shop.id)));

        let c = account(dec!(0));
        let mut request = batch(&[&a, &b, &c], &[dec!(100), dec!(100), dec!(100)], BatchDirection::Deposit);
        request.counterparty = Some(AccountRef::id(shop.id));
        let legs = vec![Ok(a), Ok(b), Ok(c)];
        let failures = LedgerService::plan_batch(&request, &legs, Some(&shop)).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 2);
    }

    #[test]
    fn test_batch_unresolved_leg_reported() {
        let a = account(dec!(100));
        let request = batch(&[&a, &a], &[dec!(10), dec!(10)], BatchDirection::Deposit);
        let legs = vec![Ok(a), Err(LedgerError::AccountNotFound("001-1234566".into()))];
        let failures = LedgerService::plan_batch(&request, &legs, None).unwrap_err();
        assert!(matches!(failures[0].error, LedgerError::AccountNotFound(_)));
    }

    fn record(from: &AccountSnapshot, to: &AccountSnapshot) -> TransactionRecord {
        TransactionRecord {
            id: TransactionId::new(),
            transaction_type: TransactionType::Transfer,
            status: TransactionStatus::Completed,
            from_account_id: Some(from.id),
            to_account_id: Some(to.id),
            amount: dec!(300),
            currency: Currency::Jpy,
            description: None,
            reverses_transaction_id: None,
            executed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_reversal_swaps_sides() {
        let a = account(dec!(0));
        let b = account(dec!(300));
        let original = record(&a, &b);
        let plan = LedgerService::plan_reversal(&original, Some(&b), Some(&a), "disputed").unwrap();
        assert_eq!(plan.from_account_id, Some(b.id));
        assert_eq!(plan.to_account_id, Some(a.id));
        assert_eq!(plan.reverses, Some(original.id));
        assert!(validate_entries(&plan.entries, true).is_ok());
    }

    #[test]
    fn test_reversal_of_deposit_is_a_withdrawal() {
        let a = account(dec!(300));
        let mut original = record(&a, &a);
        original.transaction_type = TransactionType::Deposit;
        original.from_account_id = None;
        let plan = LedgerService::plan_reversal(&original, Some(&a), None, "bounced").unwrap();
        assert_eq!(plan.transaction_type, TransactionType::Withdrawal);
        assert_eq!(plan.from_account_id, Some(a.id));
        assert_eq!(plan.to_account_id, None);
        assert!(validate_entries(&plan.entries, false).is_ok());

        let withdrawn = TransactionRecord {
            transaction_type: TransactionType::Withdrawal,
            from_account_id: Some(a.id),
            to_account_id: None,
            ..record(&a, &a)
        };
        let plan = LedgerService::plan_reversal(&withdrawn, None, Some(&a), "teller error").unwrap();
        assert_eq!(plan.transaction_type, TransactionType::Deposit);
        assert_eq!(plan.to_account_id, Some(a.id));
        assert_eq!(plan.from_account_id, None);
    }

    #[test]
    fn test_reversal_requires_completed_original() {
        let a = account(dec!(0));
        let b = account(dec!(300));
        let mut original = record(&a, &b);
        original.status = TransactionStatus::Reversed;
        assert_eq!(
            LedgerService::plan_reversal(&original, Some(&b), Some(&a), "again"),
            Err(LedgerError::NotReversible(original.id))
        );

        let mut reversing = record(&a, &b);
        reversing.reverses_transaction_id = Some(TransactionId::new());
        assert!(LedgerService::plan_reversal(&reversing, Some(&b), Some(&a), "x").is_err());
    }

    #[test]
    fn test_reversal_needs_funds_on_debit_side() {
        let a = account(dec!(0));
        let b = account(dec!(100));
        let original = record(&a, &b);
        assert!(matches!(
            LedgerService::plan_reversal(&original, Some(&b), Some(&a), "x"),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_close_rules() {
        assert!(LedgerService::check_closable(&account(dec!(0))).is_ok());
        assert!(matches!(
            LedgerService::check_closable(&account(dec!(1))),
            Err(LedgerError::BalanceRemaining(_))
        ));
        let mut closed = account(dec!(0));
        closed.status = AccountStatus::Closed;
        assert!(LedgerService::check_closable(&closed).is_err());
    }

    #[test]
    fn test_enforcement_never_resurrects_closed() {
        assert_eq!(
            LedgerService::next_enforcement_status(AccountStatus::Active, true),
            AccountStatus::Frozen
        );
        assert_eq!(
            LedgerService::next_enforcement_status(AccountStatus::Frozen, false),
            AccountStatus::Active
        );
        assert_eq!(
            LedgerService::next_enforcement_status(AccountStatus::Closed, false),
            AccountStatus::Closed
        );
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(LedgerService::history_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(LedgerService::history_limit(Some(0)), 1);
        assert_eq!(LedgerService::history_limit(Some(1_000)), MAX_HISTORY_LIMIT);
    }
}
