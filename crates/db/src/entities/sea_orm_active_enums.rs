//! Postgres enums and their mapping to domain enums.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use kinko_core::{account, chips, collections, ledger, loans, tax};

/// Declares a Postgres enum and the `From` conversions to and from the
/// domain enum with the same variants.
macro_rules! db_enum {
    ($name:ident, $pg:literal, $domain:ty, { $($variant:ident => $value:literal),+ $(,)? }) => {
        #[doc = concat!("`", $pg, "` enum.")]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
        #[sea_orm(rs_type = "String", db_type = "Enum", enum_name = $pg)]
        #[allow(missing_docs)]
        pub enum $name {
            $(
                #[sea_orm(string_value = $value)]
                $variant,
            )+
        }

        impl From<$domain> for $name {
            fn from(value: $domain) -> Self {
                type Domain = $domain;
                match value {
                    $(Domain::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$name> for $domain {
            fn from(value: $name) -> Self {
                type Domain = $domain;
                match value {
                    $($name::$variant => Domain::$variant,)+
                }
            }
        }
    };
}

db_enum!(AccountStatus, "account_status", ledger::AccountStatus, {
    Active => "active",
    Frozen => "frozen",
    Closed => "closed",
});

db_enum!(AccountType, "account_type", account::AccountType, {
    Ordinary => "ordinary",
    TimeDeposit => "time_deposit",
    Current => "current",
});

db_enum!(SystemRole, "system_role", account::SystemRole, {
    LoanReserve => "loan_reserve",
    ChipShop => "chip_shop",
    TaxAuthority => "tax_authority",
});

db_enum!(TransactionType, "transaction_type", ledger::TransactionType, {
    Transfer => "transfer",
    Deposit => "deposit",
    Withdrawal => "withdrawal",
    Fee => "fee",
    Interest => "interest",
});

db_enum!(TransactionStatus, "transaction_status", ledger::TransactionStatus, {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Reversed => "reversed",
});

db_enum!(EntryType, "entry_type", ledger::EntryType, {
    Debit => "debit",
    Credit => "credit",
});

db_enum!(ChipTransactionKind, "chip_transaction_kind", chips::ChipTransactionKind, {
    Purchase => "purchase",
    Bonus => "bonus",
    Lock => "lock",
    Release => "release",
    Settlement => "settlement",
    TransferOut => "transfer_out",
    TransferIn => "transfer_in",
    Redeem => "redeem",
});

db_enum!(ChipLockStatus, "chip_lock_status", chips::ChipLockStatus, {
    Held => "held",
    Settled => "settled",
    Released => "released",
});

db_enum!(LoanStatus, "loan_status", loans::LoanStatus, {
    Active => "active",
    Resolved => "resolved",
});

db_enum!(LoanPaymentKind, "loan_payment_kind", loans::LoanPaymentKind, {
    Autopay => "autopay",
    Manual => "manual",
    Seizure => "seizure",
});

db_enum!(PaymentStatus, "payment_status", loans::PaymentStatus, {
    Succeeded => "succeeded",
    Failed => "failed",
});

db_enum!(IncomeSource, "income_source", tax::IncomeSource, {
    Wages => "wages",
    Dividends => "dividends",
    CapitalGains => "capital_gains",
    Gambling => "gambling",
});

db_enum!(TaxAssessmentStatus, "tax_assessment_status", tax::TaxAssessmentStatus, {
    Assessed => "assessed",
    Paid => "paid",
});

db_enum!(CaseKind, "case_kind", collections::CaseKind, {
    Tax => "tax",
    Loan => "loan",
});

db_enum!(CaseStatus, "case_status", collections::CaseStatus, {
    InPaymentWindow => "in_payment_window",
    Overdue => "overdue",
    Seizure => "seizure",
    Resolved => "resolved",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_domain() {
        for status in [
            ledger::AccountStatus::Active,
            ledger::AccountStatus::Frozen,
            ledger::AccountStatus::Closed,
        ] {
            assert_eq!(ledger::AccountStatus::from(AccountStatus::from(status)), status);
        }
        assert_eq!(
            CaseStatus::from(collections::CaseStatus::InPaymentWindow).to_value(),
            "in_payment_window"
        );
        assert_eq!(IncomeSource::CapitalGains.to_value(), "capital_gains");
    }
}
