//! # Sale Engine
//!
//! The entry point callers use: create, void, read and list sales.
//!
//! ## Create Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleRequest                                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_sale_request ──── ValidationError ──► Rejected (no reads)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  client exists? ─────────── ClientNotFound ───► Rejected               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  products.get_by_ids(distinct ids)   one read                          │
//! │  rates.current_rate()                one read                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  build_sale(request, snapshot, rate, now)  ── pure ──► SaleError       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sales.create_sale(write_set)        one transaction                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleReceipt { id, totals, rate, change }                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{DbResult, EngineResult};
use crate::pool::Database;
use crate::rates::{ExchangeRateProvider, StoredExchangeRates};
use crate::repository::sale::SaleFilter;
use mercado_core::validation::validate_sale_request;
use mercado_core::{build_sale, ExchangeRate, Money, SaleDetail, SaleError, SaleRequest, SaleSummary};

/// What the register shows after a sale commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub id: i64,
    pub total_usd: Money,
    pub total_bs: Money,
    pub exchange_rate: ExchangeRate,
    /// Over-payment handed back. Not stored.
    pub change_usd: Money,
}

/// Creates, voids and reads sales.
#[derive(Clone)]
pub struct SaleEngine {
    db: Database,
    rates: Arc<dyn ExchangeRateProvider>,
    sales_page_limit: i64,
}

impl SaleEngine {
    pub fn new(db: Database, rates: Arc<dyn ExchangeRateProvider>) -> Self {
        SaleEngine {
            db,
            rates,
            sales_page_limit: EngineConfig::default().sales_page_limit,
        }
    }

    /// Opens the database described by `config` and reads rates from it.
    pub async fn from_config(config: &EngineConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        let rates = Arc::new(StoredExchangeRates::new(db.pool().clone()));

        Ok(SaleEngine::new(db, rates).with_page_limit(config.sales_page_limit))
    }

    /// Rows returned by [`list_sales`](Self::list_sales) when the filter has
    /// no limit.
    pub fn with_page_limit(mut self, limit: i64) -> Self {
        self.sales_page_limit = limit.max(1);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Prices, validates and commits one sale.
    pub async fn create_sale(&self, request: SaleRequest) -> EngineResult<SaleReceipt> {
        self.try_create_sale(request).await.inspect_err(|e| {
            warn!(code = e.code(), error = %e, "Sale rejected");
        })
    }

    async fn try_create_sale(&self, request: SaleRequest) -> EngineResult<SaleReceipt> {
        validate_sale_request(&request)?;

        if let Some(client_id) = request.client_id {
            if self.db.clients().get_by_id(client_id).await?.is_none() {
                return Err(SaleError::ClientNotFound(client_id).into());
            }
        }

        let snapshot = self.db.products().get_by_ids(&request.product_ids()).await?;
        let rate = self.rates.current_rate().await?;

        let write_set = build_sale(request, &snapshot, rate, Utc::now())?;
        let id = self.db.sales().create_sale(&write_set).await?;

        let receipt = SaleReceipt {
            id,
            total_usd: write_set.sale.total_usd,
            total_bs: write_set.sale.total_bs,
            exchange_rate: write_set.sale.exchange_rate,
            change_usd: write_set.change(),
        };

        info!(
            sale_id = id,
            total_usd = %receipt.total_usd,
            change_usd = %receipt.change_usd,
            "Receipt issued"
        );

        Ok(receipt)
    }

    /// Reverses a completed sale.
    pub async fn void_sale(&self, sale_id: i64, reason: Option<&str>) -> EngineResult<()> {
        self.db.sales().void_sale(sale_id, reason).await
    }

    /// A sale with its items and payments.
    pub async fn get_sale(&self, sale_id: i64) -> EngineResult<SaleDetail> {
        self.db
            .sales()
            .get_detail(sale_id)
            .await?
            .ok_or_else(|| SaleError::SaleNotFound(sale_id).into())
    }

    /// Newest sales first.
    pub async fn list_sales(&self, filter: &SaleFilter) -> DbResult<Vec<SaleSummary>> {
        self.db.sales().list(filter, self.sales_page_limit).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::FixedExchangeRate;
    use crate::DbConfig;
    use mercado_core::{CartLine, NewProduct, PaymentInput};
    use rust_decimal_macros::dec;

    async fn engine() -> SaleEngine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let rate = ExchangeRate::new(dec!(36.50)).unwrap();
        SaleEngine::new(db, Arc::new(FixedExchangeRate(rate)))
    }

    #[tokio::test]
    async fn test_receipt_reports_change() {
        let engine = engine().await;
        let product = engine
            .database()
            .products()
            .insert(&NewProduct {
                name: "Leche 1L".to_string(),
                list_price: Money::new(dec!(1.80)),
                quantity: 12,
                min_stock: 2,
            })
            .await
            .unwrap();

        let receipt = engine
            .create_sale(SaleRequest::new(
                vec![CartLine::new(product.id, 2)],
                vec![PaymentInput::new("cash-usd", Money::new(dec!(5.00)))],
            ))
            .await
            .unwrap();

        assert_eq!(receipt.total_usd.amount(), dec!(3.60));
        assert_eq!(receipt.total_bs.amount(), dec!(131.40));
        assert_eq!(receipt.change_usd.amount(), dec!(1.40));
        assert_eq!(receipt.exchange_rate.value(), dec!(36.50));
    }

    #[tokio::test]
    async fn test_unknown_client_is_rejected() {
        let engine = engine().await;
        let err = engine
            .create_sale(
                SaleRequest::new(
                    vec![CartLine::new(1, 1)],
                    vec![PaymentInput::new("cash-usd", Money::new(dec!(1)))],
                )
                .with_client(77),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CLIENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_missing_stored_rate_is_a_persistence_error() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Pan".to_string(),
                list_price: Money::new(dec!(1)),
                quantity: 1,
                min_stock: 0,
            })
            .await
            .unwrap();
        let engine = SaleEngine::new(db.clone(), Arc::new(db.rates()));

        let err = engine
            .create_sale(SaleRequest::new(
                vec![CartLine::new(product.id, 1)],
                vec![PaymentInput::new("cash-usd", Money::new(dec!(1)))],
            ))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
    }

    #[tokio::test]
    async fn test_get_missing_sale() {
        let engine = engine().await;
        assert_eq!(engine.get_sale(5).await.unwrap_err().code(), "SALE_NOT_FOUND");
    }
}
