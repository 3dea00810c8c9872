//! Sub-ledger migration.
//!
//! Chip balances and locks, loans, tax income and assessments, collections
//! cases and the scheduler's run log. Every row produced by a cash movement
//! references the ledger transaction that moved it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(CHIPS_SQL).await?;
        db.execute_unprepared(LOANS_SQL).await?;
        db.execute_unprepared(TAX_SQL).await?;
        db.execute_unprepared(COLLECTIONS_SQL).await?;
        db.execute_unprepared(SCHEDULER_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE chip_transaction_kind AS ENUM (
    'purchase',
    'bonus',
    'lock',
    'release',
    'settlement',
    'transfer_out',
    'transfer_in',
    'redeem'
);

CREATE TYPE chip_lock_status AS ENUM ('held', 'settled', 'released');

CREATE TYPE loan_status AS ENUM ('active', 'resolved');

CREATE TYPE loan_payment_kind AS ENUM ('autopay', 'manual', 'seizure');

CREATE TYPE payment_status AS ENUM ('succeeded', 'failed');

CREATE TYPE income_source AS ENUM ('wages', 'dividends', 'capital_gains', 'gambling');

CREATE TYPE tax_assessment_status AS ENUM ('assessed', 'paid');

CREATE TYPE case_kind AS ENUM ('tax', 'loan');

CREATE TYPE case_status AS ENUM ('in_payment_window', 'overdue', 'seizure', 'resolved');
";

const CHIPS_SQL: &str = r"
CREATE TABLE chip_balances (
    customer_id UUID PRIMARY KEY REFERENCES customers(id),
    base_balance BIGINT NOT NULL DEFAULT 0,
    bonus_balance BIGINT NOT NULL DEFAULT 0,
    locked_base_balance BIGINT NOT NULL DEFAULT 0,
    locked_bonus_balance BIGINT NOT NULL DEFAULT 0,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_chip_locked_base CHECK (locked_base_balance BETWEEN 0 AND base_balance),
    CONSTRAINT chk_chip_locked_bonus CHECK (locked_bonus_balance BETWEEN 0 AND bonus_balance)
);

CREATE TABLE chip_transactions (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    kind chip_transaction_kind NOT NULL,
    base_delta BIGINT NOT NULL DEFAULT 0,
    bonus_delta BIGINT NOT NULL DEFAULT 0,
    game_session_id VARCHAR(100),
    counterparty_customer_id UUID REFERENCES customers(id),
    ledger_transaction_id UUID REFERENCES transactions(id),
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_chip_transactions_customer ON chip_transactions(customer_id, created_at DESC);

-- One lock per participant per round; settlement replays find it settled.
CREATE TABLE chip_locks (
    game_session_id VARCHAR(100) NOT NULL,
    customer_id UUID NOT NULL REFERENCES customers(id),
    locked_base BIGINT NOT NULL,
    locked_bonus BIGINT NOT NULL,
    status chip_lock_status NOT NULL DEFAULT 'held',
    payout BIGINT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    settled_at TIMESTAMPTZ,
    PRIMARY KEY (game_session_id, customer_id),
    CONSTRAINT chk_lock_amounts CHECK (
        locked_base >= 0 AND locked_bonus >= 0 AND locked_base + locked_bonus > 0
    )
);
";

const LOANS_SQL: &str = r"
CREATE TABLE loans (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    disbursement_account_id UUID NOT NULL REFERENCES accounts(id),
    autopay_account_id UUID NOT NULL REFERENCES accounts(id),
    principal NUMERIC(19, 4) NOT NULL,
    outstanding NUMERIC(19, 4) NOT NULL,
    weekly_rate NUMERIC(9, 6) NOT NULL,
    penalty_weekly_rate NUMERIC(9, 6) NOT NULL,
    autopay_amount NUMERIC(19, 4) NOT NULL,
    status loan_status NOT NULL DEFAULT 'active',
    autopay_failed_since DATE,
    last_accrued_on DATE,
    last_autopay_on DATE,
    disbursement_transaction_id UUID NOT NULL REFERENCES transactions(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_loan_principal CHECK (principal > 0),
    CONSTRAINT chk_loan_outstanding CHECK (outstanding >= 0)
);

-- One active loan per customer.
CREATE UNIQUE INDEX uq_loans_active_customer ON loans(customer_id) WHERE status = 'active';

CREATE TABLE loan_payments (
    id UUID PRIMARY KEY,
    loan_id UUID NOT NULL REFERENCES loans(id),
    kind loan_payment_kind NOT NULL,
    status payment_status NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    ledger_transaction_id UUID REFERENCES transactions(id),
    failure_reason TEXT,
    business_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_amount CHECK (amount > 0),
    CONSTRAINT chk_payment_ledger CHECK (
        (status = 'succeeded') = (ledger_transaction_id IS NOT NULL)
    )
);

CREATE INDEX idx_loan_payments_loan ON loan_payments(loan_id, created_at DESC);
";

const TAX_SQL: &str = r"
CREATE TABLE tax_income_events (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    source_type income_source NOT NULL,
    source_id VARCHAR(255) NOT NULL,
    gross_amount NUMERIC(19, 4) NOT NULL,
    taxable_amount NUMERIC(19, 4) NOT NULL,
    occurred_on DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_income_source UNIQUE (source_type, source_id),
    CONSTRAINT chk_taxable_amount CHECK (taxable_amount >= 0)
);

CREATE INDEX idx_income_customer_date ON tax_income_events(customer_id, occurred_on);

CREATE TABLE tax_assessments (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    total_income NUMERIC(19, 4) NOT NULL,
    taxable_income NUMERIC(19, 4) NOT NULL,
    tax_amount NUMERIC(19, 4) NOT NULL,
    amount_paid NUMERIC(19, 4) NOT NULL DEFAULT 0,
    status tax_assessment_status NOT NULL,
    due_on DATE NOT NULL,
    payment_transaction_id UUID REFERENCES transactions(id),
    assessed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    paid_at TIMESTAMPTZ,
    CONSTRAINT uq_assessment_period UNIQUE (customer_id, period_start),
    CONSTRAINT chk_assessment_period CHECK (period_end >= period_start),
    CONSTRAINT chk_tax_amount CHECK (tax_amount >= 0),
    CONSTRAINT chk_amount_paid CHECK (amount_paid BETWEEN 0 AND tax_amount)
);
";

const COLLECTIONS_SQL: &str = r"
CREATE TABLE collections_cases (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    kind case_kind NOT NULL,
    status case_status NOT NULL,
    assessment_id UUID REFERENCES tax_assessments(id),
    loan_id UUID REFERENCES loans(id),
    overdue_since DATE,
    blacklisted BOOLEAN NOT NULL DEFAULT false,
    last_swept_on DATE,
    opened_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_case_subject CHECK (
        (kind = 'tax' AND assessment_id IS NOT NULL AND loan_id IS NULL)
        OR (kind = 'loan' AND loan_id IS NOT NULL AND assessment_id IS NULL)
    )
);

CREATE UNIQUE INDEX uq_cases_assessment ON collections_cases(assessment_id)
    WHERE assessment_id IS NOT NULL;
CREATE UNIQUE INDEX uq_cases_open_loan ON collections_cases(loan_id)
    WHERE loan_id IS NOT NULL AND status <> 'resolved';
CREATE INDEX idx_cases_customer ON collections_cases(customer_id) WHERE status <> 'resolved';

CREATE TABLE collection_seizures (
    id UUID PRIMARY KEY,
    case_id UUID NOT NULL REFERENCES collections_cases(id),
    account_id UUID NOT NULL REFERENCES accounts(id),
    amount NUMERIC(19, 4) NOT NULL,
    ledger_transaction_id UUID NOT NULL REFERENCES transactions(id),
    business_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_seizure_amount CHECK (amount > 0)
);

CREATE INDEX idx_seizures_case ON collection_seizures(case_id);
";

const SCHEDULER_SQL: &str = r"
CREATE TABLE scheduled_job_runs (
    job_name VARCHAR(100) NOT NULL,
    run_date DATE NOT NULL,
    summary JSONB,
    completed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (job_name, run_date)
);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS scheduled_job_runs CASCADE;
DROP TABLE IF EXISTS collection_seizures CASCADE;
DROP TABLE IF EXISTS collections_cases CASCADE;
DROP TABLE IF EXISTS tax_assessments CASCADE;
DROP TABLE IF EXISTS tax_income_events CASCADE;
DROP TABLE IF EXISTS loan_payments CASCADE;
DROP TABLE IF EXISTS loans CASCADE;
DROP TABLE IF EXISTS chip_locks CASCADE;
DROP TABLE IF EXISTS chip_transactions CASCADE;
DROP TABLE IF EXISTS chip_balances CASCADE;

DROP TYPE IF EXISTS case_status;
DROP TYPE IF EXISTS case_kind;
DROP TYPE IF EXISTS tax_assessment_status;
DROP TYPE IF EXISTS income_source;
DROP TYPE IF EXISTS payment_status;
DROP TYPE IF EXISTS loan_payment_kind;
DROP TYPE IF EXISTS loan_status;
DROP TYPE IF EXISTS chip_lock_status;
DROP TYPE IF EXISTS chip_transaction_kind;
";
