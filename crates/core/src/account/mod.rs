//! Account store domain types.
//!
//! - Account numbers (sequence value + Luhn check digit) and branch codes
//! - Account references accepted from collaborators
//! - Account types, system roles and the account view

pub mod error;
pub mod number;
pub mod types;

#[cfg(test)]
mod number_props;

pub use error::AccountError;
pub use number::{AccountNumber, AccountNumberError, BranchCode, SYSTEM_BRANCH_CODE};
pub use types::{
    Account, AccountRef, AccountType, InitialCredentials, OpenAccountRequest, SystemRole,
};
