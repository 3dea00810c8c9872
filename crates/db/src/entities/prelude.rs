//! Entity prelude.

pub use super::accounts::Entity as Accounts;
pub use super::branches::Entity as Branches;
pub use super::chip_balances::Entity as ChipBalances;
pub use super::chip_locks::Entity as ChipLocks;
pub use super::chip_transactions::Entity as ChipTransactions;
pub use super::collection_seizures::Entity as CollectionSeizures;
pub use super::collections_cases::Entity as CollectionsCases;
pub use super::customers::Entity as Customers;
pub use super::loan_payments::Entity as LoanPayments;
pub use super::loans::Entity as Loans;
pub use super::scheduled_job_runs::Entity as ScheduledJobRuns;
pub use super::tax_assessments::Entity as TaxAssessments;
pub use super::tax_income_events::Entity as TaxIncomeEvents;
pub use super::transaction_entries::Entity as TransactionEntries;
pub use super::transactions::Entity as Transactions;
