//! Repository error type.

use freightbill_core::currency::CurrencyError;
use freightbill_core::invoice::ValidationError;
use freightbill_core::ledger::LedgerError;
use freightbill_core::lifecycle::LifecycleError;
use freightbill_core::ownership::OwnershipError;
use freightbill_core::payment::PaymentError;
use freightbill_core::EngineError;
use sea_orm::{DbErr, RuntimeErr};

/// Errors returned by repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A billing rule rejected the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A stored row could not be turned into a domain value.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

macro_rules! engine_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for RepositoryError {
                fn from(err: $source) -> Self {
                    Self::Engine(err.into())
                }
            }
        )*
    };
}

engine_from!(
    CurrencyError,
    LedgerError,
    LifecycleError,
    OwnershipError,
    PaymentError,
    ValidationError,
);

impl RepositoryError {
    /// Shorthand for a corrupt row.
    pub fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            reason: reason.into(),
        }
    }

    /// Folds the error into the engine taxonomy.
    ///
    /// Pool exhaustion and dropped connections become the retryable
    /// `StorageUnavailable`; every other database failure is internal.
    #[must_use]
    pub fn into_engine(self) -> EngineError {
        match self {
            Self::Engine(err) => err,
            Self::Database(err) if is_transient(&err) => EngineError::StorageUnavailable(err.to_string()),
            Self::Database(err) => EngineError::Storage(err.to_string()),
            Self::CorruptRow { table, reason } => {
                EngineError::Storage(format!("corrupt row in {table}: {reason}"))
            }
        }
    }
}

/// `true` for failures where the same statement may succeed on retry.
#[must_use]
pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            matches!(
                e,
                sea_orm::sqlx::Error::PoolTimedOut
                    | sea_orm::sqlx::Error::PoolClosed
                    | sea_orm::sqlx::Error::Io(_)
            )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightbill_core::ErrorKind;
    use freightbill_shared::types::InvoiceId;

    #[test]
    fn test_engine_errors_pass_through() {
        let id = InvoiceId::new();
        let err: RepositoryError = EngineError::InvoiceNotFound(id).into();
        assert_eq!(err.into_engine().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_domain_errors_convert() {
        let err: RepositoryError = LedgerError::EmptySelection.into();
        assert_eq!(err.into_engine().error_code(), "EMPTY_SELECTION");
    }

    #[test]
    fn test_database_errors_classified() {
        let transient = RepositoryError::Database(DbErr::ConnectionAcquire(
            sea_orm::ConnAcquireErr::Timeout,
        ));
        assert!(transient.into_engine().is_retryable());

        let fatal = RepositoryError::Database(DbErr::RecordNotInserted);
        assert!(!fatal.into_engine().is_retryable());
    }

    #[test]
    fn test_corrupt_row_is_internal() {
        let err = RepositoryError::corrupt("invoices", "bad currency");
        assert_eq!(err.into_engine().kind(), ErrorKind::Internal);
    }
}
