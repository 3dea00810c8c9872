//! Account references, account types and system roles.

use chrono::{DateTime, Utc};
use kinko_shared::types::{AccountId, Currency, CustomerId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::number::{AccountNumber, BranchCode};
use crate::ledger::AccountStatus;

/// How a collaborator names an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// By surrogate id.
    Id {
        /// The account id.
        account_id: AccountId,
    },
    /// By external branch code and account number.
    Number {
        /// Branch code.
        branch_code: BranchCode,
        /// Account number within the branch.
        account_number: AccountNumber,
    },
}

impl AccountRef {
    /// Reference by id.
    #[must_use]
    pub const fn id(account_id: AccountId) -> Self {
        Self::Id { account_id }
    }

    /// Reference by branch and number.
    #[must_use]
    pub const fn number(branch_code: BranchCode, account_number: AccountNumber) -> Self {
        Self::Number {
            branch_code,
            account_number,
        }
    }
}

impl std::fmt::Display for AccountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id { account_id } => write!(f, "{account_id}"),
            Self::Number {
                branch_code,
                account_number,
            } => write!(f, "{branch_code}-{account_number}"),
        }
    }
}

/// Account product type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Ordinary deposit account.
    Ordinary,
    /// Time deposit.
    TimeDeposit,
    /// Current (checking) account.
    Current,
}

/// Roles of the system-owned counterparty accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    /// Lends loan principal and receives repayments.
    LoanReserve,
    /// Receives chip purchases and pays chip redemptions.
    ChipShop,
    /// Receives tax payments and tax seizures.
    TaxAuthority,
}

impl SystemRole {
    /// All roles, in creation order.
    pub const ALL: [Self; 3] = [Self::LoanReserve, Self::ChipShop, Self::TaxAuthority];

    /// Stable name used in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoanReserve => "loan_reserve",
            Self::ChipShop => "chip_shop",
            Self::TaxAuthority => "tax_authority",
        }
    }

    /// Owner identity of the customer record holding this account.
    #[must_use]
    pub fn owner_identity(self) -> String {
        format!("system:{}", self.as_str())
    }

    /// Display name of the owning customer.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::LoanReserve => "Loan Reserve",
            Self::ChipShop => "Chip Shop Operations",
            Self::TaxAuthority => "Tax Authority",
        }
    }
}

impl std::fmt::Display for SystemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account as returned to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Surrogate id.
    pub id: AccountId,
    /// External number, unique within the branch.
    pub account_number: AccountNumber,
    /// Owning branch.
    pub branch_code: BranchCode,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// External user reference of the owner.
    pub owner_identity: String,
    /// Product type.
    pub account_type: AccountType,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// Account currency.
    pub currency: Currency,
    /// Current balance.
    pub balance: Decimal,
    /// When the account was opened.
    pub opened_at: DateTime<Utc>,
}

/// Credentials supplied when the first account of a customer is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialCredentials {
    /// Name shown to other users.
    pub display_name: String,
    /// Numeric PIN, 4 to 8 digits.
    pub pin: String,
}

/// Input of `open_account`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    /// External user reference.
    pub owner_identity: String,
    /// Branch to open the account at.
    pub branch_code: BranchCode,
    /// Product type.
    pub account_type: AccountType,
    /// Credentials for a new customer. Ignored for existing customers.
    pub credentials: InitialCredentials,
}
