//! Ledger migration.
//!
//! Creates the account store and the double-entry ledger: enums, branches,
//! customers, accounts, the account number sequence, transactions, entries
//! and the triggers that guard them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ACCOUNT STORE
        // ============================================================
        db.execute_unprepared(BRANCHES_SQL).await?;
        db.execute_unprepared(CUSTOMERS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: TRANSACTIONS & ENTRIES
        // ============================================================
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(TRANSACTION_ENTRIES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        // ============================================================
        // PART 5: SEED DATA
        // ============================================================
        db.execute_unprepared(SEED_BRANCHES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_status AS ENUM ('active', 'frozen', 'closed');

CREATE TYPE account_type AS ENUM ('ordinary', 'time_deposit', 'current');

CREATE TYPE system_role AS ENUM ('loan_reserve', 'chip_shop', 'tax_authority');

CREATE TYPE transaction_type AS ENUM (
    'transfer',
    'deposit',
    'withdrawal',
    'fee',
    'interest'
);

CREATE TYPE transaction_status AS ENUM (
    'pending',
    'completed',
    'failed',
    'reversed'
);

CREATE TYPE entry_type AS ENUM ('debit', 'credit');
";

const BRANCHES_SQL: &str = r"
CREATE TABLE branches (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code CHAR(3) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_branch_code CHECK (code ~ '^[0-9]{3}$')
);
";

const CUSTOMERS_SQL: &str = r"
CREATE TABLE customers (
    id UUID PRIMARY KEY,
    owner_identity VARCHAR(255) NOT NULL UNIQUE,
    display_name VARCHAR(100) NOT NULL,
    credential_hash VARCHAR(255) NOT NULL,
    failed_auth_attempts INTEGER NOT NULL DEFAULT 0,
    blacklisted_at TIMESTAMPTZ,
    blacklist_reason TEXT,
    tax_source_account_id UUID,
    redemption_account_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_failed_attempts CHECK (failed_auth_attempts >= 0)
);
";

const ACCOUNTS_SQL: &str = r"
-- Values 1..999999 followed by a Luhn check digit give 7-digit numbers.
CREATE SEQUENCE account_number_seq MINVALUE 1 MAXVALUE 999999 NO CYCLE;

CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    branch_id UUID NOT NULL REFERENCES branches(id),
    account_number CHAR(7) NOT NULL,
    account_type account_type NOT NULL DEFAULT 'ordinary',
    status account_status NOT NULL DEFAULT 'active',
    currency CHAR(3) NOT NULL,
    -- Non-negativity is enforced by the ledger at posting time.
    balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    system_role system_role UNIQUE,
    frozen_by_enforcement BOOLEAN NOT NULL DEFAULT false,
    opened_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    closed_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_account_number UNIQUE (branch_id, account_number),
    CONSTRAINT uq_customer_branch UNIQUE (customer_id, branch_id),
    CONSTRAINT chk_account_number CHECK (account_number ~ '^[0-9]{7}$')
);

CREATE INDEX idx_accounts_customer ON accounts(customer_id);

ALTER TABLE customers
    ADD CONSTRAINT fk_customers_tax_source
        FOREIGN KEY (tax_source_account_id) REFERENCES accounts(id),
    ADD CONSTRAINT fk_customers_redemption
        FOREIGN KEY (redemption_account_id) REFERENCES accounts(id);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    transaction_type transaction_type NOT NULL,
    status transaction_status NOT NULL,
    from_account_id UUID REFERENCES accounts(id),
    to_account_id UUID REFERENCES accounts(id),
    amount NUMERIC(19, 4) NOT NULL,
    currency CHAR(3) NOT NULL,
    description TEXT,
    reverses_transaction_id UUID UNIQUE REFERENCES transactions(id),
    executed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_transaction_amount CHECK (amount > 0),
    CONSTRAINT chk_transaction_sides CHECK (
        from_account_id IS NOT NULL OR to_account_id IS NOT NULL
    )
);

CREATE INDEX idx_transactions_from ON transactions(from_account_id, executed_at DESC);
CREATE INDEX idx_transactions_to ON transactions(to_account_id, executed_at DESC);
";

const TRANSACTION_ENTRIES_SQL: &str = r"
CREATE TABLE transaction_entries (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    entry_type entry_type NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_amount CHECK (amount > 0)
);

CREATE INDEX idx_entries_transaction ON transaction_entries(transaction_id);
CREATE INDEX idx_entries_account ON transaction_entries(account_id, created_at DESC);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_symmetry
-- Two-sided transactions carry one debit and one credit of the same
-- amount; single-sided ones carry exactly one entry.
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_symmetry()
RETURNS TRIGGER AS $$
DECLARE
    txn_type transaction_type;
    txn_amount NUMERIC(19, 4);
    debit_count INTEGER;
    credit_count INTEGER;
    debit_total NUMERIC(19, 4);
    credit_total NUMERIC(19, 4);
BEGIN
    SELECT transaction_type, amount INTO txn_type, txn_amount
    FROM transactions
    WHERE id = NEW.transaction_id;

    SELECT
        COUNT(*) FILTER (WHERE entry_type = 'debit'),
        COUNT(*) FILTER (WHERE entry_type = 'credit'),
        COALESCE(SUM(amount) FILTER (WHERE entry_type = 'debit'), 0),
        COALESCE(SUM(amount) FILTER (WHERE entry_type = 'credit'), 0)
    INTO debit_count, credit_count, debit_total, credit_total
    FROM transaction_entries
    WHERE transaction_id = NEW.transaction_id;

    IF txn_type IN ('deposit', 'withdrawal') THEN
        IF debit_count + credit_count <> 1 THEN
            RAISE EXCEPTION 'Single-sided transaction % must have exactly one entry, found %',
                NEW.transaction_id, debit_count + credit_count;
        END IF;
        IF debit_total + credit_total <> txn_amount THEN
            RAISE EXCEPTION 'Entry amount does not match transaction %', NEW.transaction_id;
        END IF;
    ELSE
        IF debit_count <> 1 OR credit_count <> 1 THEN
            RAISE EXCEPTION 'Transaction % must have one debit and one credit, found % and %',
                NEW.transaction_id, debit_count, credit_count;
        END IF;
        IF debit_total <> credit_total OR debit_total <> txn_amount THEN
            RAISE EXCEPTION 'Transaction % is not balanced. Debit: %, Credit: %',
                NEW.transaction_id, debit_total, credit_total;
        END IF;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_symmetry
AFTER INSERT ON transaction_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_symmetry();

-- ============================================================
-- FUNCTION: prevent_transaction_modification
-- Completed transactions are immutable except for completed -> reversed.
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_transaction_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'completed'
        AND NEW.status = 'reversed'
        AND NEW.transaction_type = OLD.transaction_type
        AND NEW.from_account_id IS NOT DISTINCT FROM OLD.from_account_id
        AND NEW.to_account_id IS NOT DISTINCT FROM OLD.to_account_id
        AND NEW.amount = OLD.amount
        AND NEW.currency = OLD.currency
        AND NEW.description IS NOT DISTINCT FROM OLD.description
        AND NEW.reverses_transaction_id IS NOT DISTINCT FROM OLD.reverses_transaction_id
        AND NEW.executed_at = OLD.executed_at
    THEN
        RETURN NEW;
    END IF;

    IF OLD.status IN ('completed', 'reversed') THEN
        RAISE EXCEPTION 'Cannot modify % transaction %. Post a reversal instead.',
            OLD.status, OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_transaction_mod
BEFORE UPDATE ON transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_transaction_modification();

-- ============================================================
-- FUNCTION: prevent_entry_modification
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_entry_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Transaction entries are immutable';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_entry_mod
BEFORE UPDATE ON transaction_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_entry_modification();

-- ============================================================
-- FUNCTION: prevent_account_resurrection
-- Closed is terminal.
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_account_resurrection()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status = 'closed' AND NEW.status <> 'closed' THEN
        RAISE EXCEPTION 'Account % is closed', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_account_resurrection
BEFORE UPDATE ON accounts
FOR EACH ROW
EXECUTE FUNCTION prevent_account_resurrection();
";

const SEED_BRANCHES_SQL: &str = r"
INSERT INTO branches (code, name) VALUES
    ('000', 'System'),
    ('001', 'Head Office');
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS transaction_entries CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
ALTER TABLE IF EXISTS customers DROP CONSTRAINT IF EXISTS fk_customers_tax_source;
ALTER TABLE IF EXISTS customers DROP CONSTRAINT IF EXISTS fk_customers_redemption;
DROP TABLE IF EXISTS accounts CASCADE;
DROP SEQUENCE IF EXISTS account_number_seq;
DROP TABLE IF EXISTS customers CASCADE;
DROP TABLE IF EXISTS branches CASCADE;

DROP FUNCTION IF EXISTS check_entry_symmetry();
DROP FUNCTION IF EXISTS prevent_transaction_modification();
DROP FUNCTION IF EXISTS prevent_entry_modification();
DROP FUNCTION IF EXISTS prevent_account_resurrection();

DROP TYPE IF EXISTS entry_type;
DROP TYPE IF EXISTS transaction_status;
DROP TYPE IF EXISTS transaction_type;
DROP TYPE IF EXISTS system_role;
DROP TYPE IF EXISTS account_type;
DROP TYPE IF EXISTS account_status;
";
