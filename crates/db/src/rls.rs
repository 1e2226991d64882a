//! Tenant-scoped transactions.
//!
//! Every repository write runs inside a [`TenantConnection`]: a transaction
//! whose `app.current_tenant_id` setting feeds the row-level security
//! policies created by the migration. Repositories still filter on
//! `tenant_id` explicitly; the policy catches a query that forgets to.
//!
//! ```ignore
//! let tenant = TenantConnection::begin(&db, tenant_id).await?;
//! let rows = invoices::Entity::find().all(tenant.transaction()).await?;
//! tenant.commit().await?;
//! ```

use freightbill_shared::types::TenantId;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};

/// A transaction bound to one tenant.
pub struct TenantConnection {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl TenantConnection {
    /// Begins a transaction and sets the tenant with `SET LOCAL`, which
    /// scopes the setting to this transaction only.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started or the
    /// setting cannot be applied.
    pub async fn begin(db: &DatabaseConnection, tenant_id: TenantId) -> Result<Self, DbErr> {
        let txn = db.begin().await?;
        txn.execute_unprepared(&tenant_context_sql(tenant_id)).await?;
        Ok(Self { txn, tenant_id })
    }

    /// The underlying transaction.
    #[must_use]
    pub const fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Tenant the transaction is bound to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// `SET LOCAL` statement for a tenant. The id is a formatted UUID, never
/// caller text.
fn tenant_context_sql(tenant_id: TenantId) -> String {
    format!("SET LOCAL app.current_tenant_id = '{tenant_id}'")
}
