//! Core business logic for Kinko.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! The db crate reads state under locks, asks these services what to post, and
//! writes the result.
//!
//! # Modules
//!
//! - `account` - Account numbers, references and system roles
//! - `auth` - PIN hashing and lockout rules
//! - `ledger` - Double-entry posting plans and validation
//! - `chips` - Chip sub-ledger arithmetic and locks
//! - `loans` - Loan pricing, accrual and repayment
//! - `tax` - Progressive income tax
//! - `collections` - Overdue escalation and seizure planning

pub mod account;
pub mod auth;
pub mod chips;
pub mod collections;
pub mod ledger;
pub mod loans;
pub mod tax;
