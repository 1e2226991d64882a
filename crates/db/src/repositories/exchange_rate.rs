//! Exchange rates for display-currency projection.
//!
//! Rates are stored per tenant as `ledger -> display` pairs with an
//! effective date. Projectors built from them are cached briefly; currencies
//! with no stored rate fall back to the configured table.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use freightbill_core::currency::{CurrencyError, CurrencyProjector, ExchangeRate};
use freightbill_shared::CurrencyConfig;
use freightbill_shared::types::{CurrencyCode, TenantId};
use moka::future::Cache;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use crate::entities::exchange_rates;
use crate::error::RepositoryError;

/// Default cache capacity (number of tenant/currency/date entries).
const DEFAULT_CACHE_CAPACITY: u64 = 1_000;

/// Default time-to-live for cached projectors (5 minutes).
const DEFAULT_TTL_SECS: u64 = 300;

type ProjectorKey = (TenantId, CurrencyCode, NaiveDate);

/// Exchange rate repository.
#[derive(Clone)]
pub struct ExchangeRateRepository {
    db: DatabaseConnection,
    fallback: Arc<CurrencyConfig>,
    cache: Cache<ProjectorKey, Arc<CurrencyProjector>>,
}

impl ExchangeRateRepository {
    /// Creates a repository with the default cache settings.
    #[must_use]
    pub fn new(db: DatabaseConnection, fallback: CurrencyConfig) -> Self {
        Self::with_cache(db, fallback, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a repository with a custom cache size and time-to-live.
    #[must_use]
    pub fn with_cache(
        db: DatabaseConnection,
        fallback: CurrencyConfig,
        max_capacity: u64,
        ttl_secs: u64,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self {
            db,
            fallback: Arc::new(fallback),
            cache,
        }
    }

    /// Creates or replaces the rate for a pair on a date.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExchangeRate` for a non-positive rate or a pair whose
    /// sides are equal, or a database error.
    pub async fn upsert_rate(
        &self,
        tenant_id: TenantId,
        rate: &ExchangeRate,
    ) -> Result<(), RepositoryError> {
        if rate.rate <= Decimal::ZERO || rate.from_currency == rate.to_currency {
            return Err(CurrencyError::InvalidExchangeRate {
                currency: rate.to_currency.to_string(),
                rate: rate.rate,
            }
            .into());
        }

        let model = exchange_rates::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id.into_inner()),
            from_currency: Set(rate.from_currency.to_string()),
            to_currency: Set(rate.to_currency.to_string()),
            rate: Set(rate.rate),
            effective_date: Set(rate.effective_date),
            created_at: Set(Utc::now().into()),
        };
        exchange_rates::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    exchange_rates::Column::TenantId,
                    exchange_rates::Column::FromCurrency,
                    exchange_rates::Column::ToCurrency,
                    exchange_rates::Column::EffectiveDate,
                ])
                .update_column(exchange_rates::Column::Rate)
                .to_owned(),
            )
            .exec(&self.db)
            .await?;

        self.cache.invalidate_all();
        tracing::info!(
            tenant_id = %tenant_id,
            from = %rate.from_currency,
            to = %rate.to_currency,
            rate = %rate.rate,
            effective_date = %rate.effective_date,
            "Exchange rate stored"
        );
        Ok(())
    }

    /// Stored rates out of `ledger_currency`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is corrupt.
    pub async fn list_rates(
        &self,
        tenant_id: TenantId,
        ledger_currency: &CurrencyCode,
    ) -> Result<Vec<ExchangeRate>, RepositoryError> {
        exchange_rates::Entity::find()
            .filter(exchange_rates::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(exchange_rates::Column::FromCurrency.eq(ledger_currency.as_str()))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .all(&self.db)
            .await?
            .into_iter()
            .map(rate_from_model)
            .collect()
    }

    /// Projector for a tenant's ledger currency as of a date.
    ///
    /// # Errors
    ///
    /// Returns an error if rates cannot be loaded.
    pub async fn projector(
        &self,
        tenant_id: TenantId,
        ledger_currency: &CurrencyCode,
        as_of: NaiveDate,
    ) -> Result<Arc<CurrencyProjector>, RepositoryError> {
        let key = (tenant_id, ledger_currency.clone(), as_of);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let stored = self.list_rates(tenant_id, ledger_currency).await?;
        let projector = CurrencyProjector::from_rates(ledger_currency.clone(), &stored, as_of)?;
        let projector = Arc::new(with_fallback(projector, &self.fallback)?);
        self.cache.insert(key, Arc::clone(&projector)).await;
        Ok(projector)
    }
}

fn rate_from_model(model: exchange_rates::Model) -> Result<ExchangeRate, RepositoryError> {
    let code = |s: &str| {
        CurrencyCode::parse(s).map_err(|e| RepositoryError::corrupt("exchange_rates", e.to_string()))
    };
    Ok(ExchangeRate::new(
        code(&model.from_currency)?,
        code(&model.to_currency)?,
        model.rate,
        model.effective_date,
    ))
}

/// Adds configured rates for currencies the tenant has no stored rate for.
///
/// The configured table is expressed against the configured ledger
/// currency, so it only applies to tenants using that same currency.
fn with_fallback(
    projector: CurrencyProjector,
    fallback: &CurrencyConfig,
) -> Result<CurrencyProjector, CurrencyError> {
    if projector.ledger_currency().as_str() != fallback.ledger_currency.to_ascii_uppercase() {
        return Ok(projector);
    }
    fallback.rates.iter().try_fold(projector, |projector, (code, rate)| {
        let code = CurrencyCode::parse(code).map_err(|e| CurrencyError::InvalidCurrencyCode(e.0))?;
        if projector.rate_for(&code).is_ok() {
            Ok(projector)
        } else {
            projector.with_rate(code, *rate)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    fn config(ledger: &str, rates: &[(&str, Decimal)]) -> CurrencyConfig {
        CurrencyConfig {
            ledger_currency: ledger.to_string(),
            rates: rates
                .iter()
                .map(|(c, r)| ((*c).to_string(), *r))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_fallback_fills_missing_currencies() {
        let stored = CurrencyProjector::new(code("USD"))
            .with_rate(code("EUR"), dec!(0.92))
            .unwrap();
        let projector = with_fallback(
            stored,
            &config("USD", &[("EUR", dec!(0.5)), ("AED", dec!(3.6725))]),
        )
        .unwrap();

        assert_eq!(projector.rate_for(&code("EUR")).unwrap(), dec!(0.92));
        assert_eq!(projector.rate_for(&code("AED")).unwrap(), dec!(3.6725));
    }

    #[test]
    fn test_fallback_ignored_for_other_ledger() {
        let projector = with_fallback(
            CurrencyProjector::new(code("AED")),
            &config("USD", &[("EUR", dec!(0.92))]),
        )
        .unwrap();
        assert!(projector.rate_for(&code("EUR")).is_err());
    }

    #[test]
    fn test_bad_fallback_rate_rejected() {
        let err = with_fallback(
            CurrencyProjector::new(code("USD")),
            &config("USD", &[("EUR", dec!(0))]),
        )
        .unwrap_err();
        assert!(matches!(err, CurrencyError::InvalidExchangeRate { .. }));
    }
}
