//! # Exchange Rate Provider
//!
//! The engine reads the current Bs/USD rate once per sale through
//! [`ExchangeRateProvider`]. Administration of rates happens elsewhere; this
//! module only reads (plus a `record` helper for seeding and tests).
//!
//! ```text
//! SaleEngine ──► Arc<dyn ExchangeRateProvider>
//!                     ├── StoredExchangeRates  (exchange_rates table, newest row)
//!                     └── FixedExchangeRate    (one constant rate)
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use mercado_core::ExchangeRate;

/// Source of the current exchange rate.
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Bs per USD right now.
    async fn current_rate(&self) -> DbResult<ExchangeRate>;
}

// =============================================================================
// Stored Rates
// =============================================================================

/// Rates kept in the `exchange_rates` table. The newest row is current.
#[derive(Debug, Clone)]
pub struct StoredExchangeRates {
    pool: SqlitePool,
}

impl StoredExchangeRates {
    pub fn new(pool: SqlitePool) -> Self {
        StoredExchangeRates { pool }
    }

    /// Appends a new rate, which becomes current.
    pub async fn record(&self, rate: ExchangeRate) -> DbResult<i64> {
        debug!(rate = %rate, "Recording exchange rate");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO exchange_rates (rate, created_at)
            VALUES (?1, ?2)
            RETURNING id
            "#,
        )
        .bind(rate.to_string())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    /// Newest rate, if any was recorded.
    pub async fn latest(&self) -> DbResult<Option<ExchangeRate>> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT rate FROM exchange_rates ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|r| {
            ExchangeRate::try_from(r).map_err(|e| DbError::CheckViolation {
                message: format!("stored exchange rate: {}", e),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl ExchangeRateProvider for StoredExchangeRates {
    async fn current_rate(&self) -> DbResult<ExchangeRate> {
        self.latest()
            .await?
            .ok_or_else(|| DbError::not_found("ExchangeRate", "current"))
    }
}

// =============================================================================
// Fixed Rate
// =============================================================================

/// Always returns the same rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedExchangeRate(pub ExchangeRate);

#[async_trait]
impl ExchangeRateProvider for FixedExchangeRate {
    async fn current_rate(&self) -> DbResult<ExchangeRate> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_stored_rate_newest_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rates = db.rates();

        assert!(matches!(
            rates.current_rate().await.unwrap_err(),
            DbError::NotFound { .. }
        ));

        rates.record(ExchangeRate::new(dec!(36.50)).unwrap()).await.unwrap();
        rates.record(ExchangeRate::new(dec!(36.72)).unwrap()).await.unwrap();

        assert_eq!(rates.current_rate().await.unwrap().value(), dec!(36.72));
    }

    #[tokio::test]
    async fn test_fixed_rate() {
        let fixed = FixedExchangeRate(ExchangeRate::new(dec!(40)).unwrap());
        assert_eq!(fixed.current_rate().await.unwrap().value(), dec!(40));
    }
}
