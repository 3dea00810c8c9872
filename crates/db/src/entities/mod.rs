//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod accounts;
pub mod branches;
pub mod chip_balances;
pub mod chip_locks;
pub mod chip_transactions;
pub mod collection_seizures;
pub mod collections_cases;
pub mod customers;
pub mod loan_payments;
pub mod loans;
pub mod scheduled_job_runs;
pub mod sea_orm_active_enums;
pub mod tax_assessments;
pub mod tax_income_events;
pub mod transaction_entries;
pub mod transactions;
