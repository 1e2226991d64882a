//! Billing schema.
//!
//! Creates tenants, the client/trip/parcel directory, invoices with their
//! lines, adjustments and payments, exchange rates, per-tenant invoice
//! sequences and the row-level security policies keyed on
//! `app.current_tenant_id`.
//!
//! Numeric columns carry no precision or scale, so amounts and measures
//! come back exactly as written.

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
        // PART 2: DIRECTORY
        // ============================================================
        db.execute_unprepared(TENANTS_SQL).await?;
        db.execute_unprepared(CLIENTS_SQL).await?;
        db.execute_unprepared(TRIPS_SQL).await?;

        // ============================================================
        // PART 3: INVOICING
        // ============================================================
        db.execute_unprepared(INVOICES_SQL).await?;
        db.execute_unprepared(INVOICE_LINES_SQL).await?;
        db.execute_unprepared(INVOICE_ADJUSTMENTS_SQL).await?;
        db.execute_unprepared(INVOICE_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 4: PARCELS (after invoices, for the back-reference)
        // ============================================================
        db.execute_unprepared(PARCELS_SQL).await?;

        // ============================================================
        // PART 5: PAYMENTS & RATES
        // ============================================================
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        // ============================================================
        // PART 6: ROW-LEVEL SECURITY
        // ============================================================
        db.execute_unprepared(RLS_SQL).await?;

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
-- Overdue is derived from due_date on read and never stored
CREATE TYPE invoice_status AS ENUM ('draft', 'sent', 'partial', 'paid');

CREATE TYPE payment_method AS ENUM ('cash', 'bank_transfer', 'card', 'cheque', 'other');
";

const TENANTS_SQL: &str = r"
CREATE TABLE tenants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    ledger_currency CHAR(3) NOT NULL DEFAULT 'USD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const CLIENTS_SQL: &str = r"
CREATE TABLE clients (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    default_currency CHAR(3) NOT NULL,
    default_rate_per_kg NUMERIC NOT NULL DEFAULT 0 CHECK (default_rate_per_kg >= 0),
    vat_number VARCHAR(64),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_clients_tenant ON clients(tenant_id);
";

const TRIPS_SQL: &str = r"
CREATE TABLE trips (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    trip_number VARCHAR(64) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_trips_number UNIQUE (tenant_id, trip_number)
);
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    number VARCHAR(32) NOT NULL,
    client_id UUID REFERENCES clients(id),
    trip_id UUID REFERENCES trips(id),
    ledger_currency CHAR(3) NOT NULL,
    display_currency CHAR(3) NOT NULL,
    issue_date DATE NOT NULL,
    due_date DATE,
    payment_terms VARCHAR(64),
    notes TEXT,
    status invoice_status NOT NULL DEFAULT 'draft',
    subtotal NUMERIC NOT NULL DEFAULT 0,
    adjustment_total NUMERIC NOT NULL DEFAULT 0,
    total NUMERIC NOT NULL DEFAULT 0,
    paid_amount NUMERIC NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1,
    locked_at TIMESTAMPTZ,
    locked_by UUID,
    created_by UUID NOT NULL,
    updated_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_invoices_number UNIQUE (tenant_id, number),
    CONSTRAINT chk_invoices_due CHECK (due_date IS NULL OR due_date >= issue_date),
    CONSTRAINT chk_invoices_lock CHECK ((status = 'draft') = (locked_at IS NULL))
);

CREATE INDEX idx_invoices_tenant_status ON invoices(tenant_id, status);
CREATE INDEX idx_invoices_tenant_client ON invoices(tenant_id, client_id);
CREATE INDEX idx_invoices_tenant_created ON invoices(tenant_id, created_at DESC);
";

const INVOICE_LINES_SQL: &str = r"
-- weight is nullable: legacy rows kept it in quantity
CREATE TABLE invoice_line_items (
    id UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    parcel_id UUID,
    description TEXT NOT NULL,
    quantity NUMERIC NOT NULL DEFAULT 1,
    weight NUMERIC,
    length NUMERIC,
    width NUMERIC,
    height NUMERIC,
    rate NUMERIC NOT NULL DEFAULT 0,
    amount NUMERIC NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_invoice_lines_invoice ON invoice_line_items(invoice_id, position);

-- One line per parcel per invoice
CREATE UNIQUE INDEX uq_invoice_lines_parcel ON invoice_line_items(invoice_id, parcel_id)
    WHERE parcel_id IS NOT NULL;
";

const INVOICE_ADJUSTMENTS_SQL: &str = r"
CREATE TABLE invoice_adjustments (
    id UUID PRIMARY KEY,
    invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    description TEXT NOT NULL,
    amount NUMERIC NOT NULL CHECK (amount >= 0),
    is_addition BOOLEAN NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_invoice_adjustments_invoice ON invoice_adjustments(invoice_id, position);
";

const INVOICE_SEQUENCES_SQL: &str = r"
CREATE TABLE invoice_sequences (
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    last_value INTEGER NOT NULL,
    PRIMARY KEY (tenant_id, year)
);
";

const PARCELS_SQL: &str = r"
CREATE TABLE parcels (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    client_id UUID NOT NULL REFERENCES clients(id),
    tracking_number VARCHAR(64) NOT NULL,
    description TEXT,
    weight NUMERIC NOT NULL DEFAULT 0,
    length NUMERIC,
    width NUMERIC,
    height NUMERIC,
    invoice_id UUID REFERENCES invoices(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_parcels_tenant_client ON parcels(tenant_id, client_id);
CREATE INDEX idx_parcels_invoice ON parcels(invoice_id) WHERE invoice_id IS NOT NULL;
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    invoice_id UUID NOT NULL REFERENCES invoices(id) ON DELETE RESTRICT,
    amount NUMERIC NOT NULL CHECK (amount <> 0),
    payment_date DATE NOT NULL,
    method payment_method NOT NULL,
    reference VARCHAR(128),
    notes TEXT,
    reverses_payment_id UUID REFERENCES payments(id),
    recorded_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payments_invoice ON payments(invoice_id, created_at);

-- A payment can be reversed at most once
CREATE UNIQUE INDEX uq_payments_reverses ON payments(reverses_payment_id)
    WHERE reverses_payment_id IS NOT NULL;
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    from_currency CHAR(3) NOT NULL,
    to_currency CHAR(3) NOT NULL,
    rate NUMERIC NOT NULL CHECK (rate > 0),
    effective_date DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_exchange_rates UNIQUE (tenant_id, from_currency, to_currency, effective_date),
    CONSTRAINT chk_exchange_rates_pair CHECK (from_currency <> to_currency)
);
";

const RLS_SQL: &str = r"
ALTER TABLE clients ENABLE ROW LEVEL SECURITY;
ALTER TABLE trips ENABLE ROW LEVEL SECURITY;
ALTER TABLE invoices ENABLE ROW LEVEL SECURITY;
ALTER TABLE parcels ENABLE ROW LEVEL SECURITY;
ALTER TABLE payments ENABLE ROW LEVEL SECURITY;
ALTER TABLE exchange_rates ENABLE ROW LEVEL SECURITY;

CREATE POLICY tenant_isolation_clients ON clients
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
CREATE POLICY tenant_isolation_trips ON trips
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
CREATE POLICY tenant_isolation_invoices ON invoices
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
CREATE POLICY tenant_isolation_parcels ON parcels
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
CREATE POLICY tenant_isolation_payments ON payments
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
CREATE POLICY tenant_isolation_exchange_rates ON exchange_rates
    USING (tenant_id = current_setting('app.current_tenant_id', true)::uuid);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS parcels CASCADE;
DROP TABLE IF EXISTS invoice_sequences CASCADE;
DROP TABLE IF EXISTS invoice_adjustments CASCADE;
DROP TABLE IF EXISTS invoice_line_items CASCADE;
DROP TABLE IF EXISTS invoices CASCADE;
DROP TABLE IF EXISTS trips CASCADE;
DROP TABLE IF EXISTS clients CASCADE;
DROP TABLE IF EXISTS tenants CASCADE;
DROP TYPE IF EXISTS payment_method;
DROP TYPE IF EXISTS invoice_status;
";
