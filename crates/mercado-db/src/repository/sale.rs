//! # Sale Repository
//!
//! Writes a built sale atomically, reverses it, and serves the read views.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── INSERT sales          → id                                     │
//! │     ├── INSERT sale_payments  (one per accepted payment)               │
//! │     ├── INSERT sale_items     (price frozen)                           │
//! │     ├── UPDATE products       (conditional, one per line)              │
//! │     ├── INSERT movements      (out, "Sale #N", one per line)           │
//! │     └── COMMIT                                                         │
//! │                                                                         │
//! │  2. (OPTIONAL) VOID (one transaction)                                  │
//! │     ├── UPDATE sales SET status = 'voided' WHERE status = 'completed'  │
//! │     ├── UPDATE products       (quantity + n, one per line)             │
//! │     ├── INSERT movements      (in, "Return Sale #N", one per line)     │
//! │     └── COMMIT                                                         │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: nothing is written.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbResult, EngineResult};
use crate::ledger::{decrement_stock, explain_shortage, increment_stock};
use crate::repository::movement::append_movement;
use mercado_core::builder::SaleWriteSet;
use mercado_core::validation::validate_note;
use mercado_core::{
    return_reference, sale_reference, NewMovement, Sale, SaleDetail, SaleError, SaleItem,
    SalePayment, SaleSummary,
};

const SALE_COLUMNS: &str = "s.id, s.subtotal_usd, s.total_usd, s.total_bs, s.exchange_rate, \
     s.discount_percent, s.notes, s.client_id, s.status, s.voided_at, s.void_reason, s.created_at";

/// Filter for the sales list. Dates are inclusive calendar days in UTC.
///
/// The upper bound is the start of the day after `to_date`. `NaiveDate::MAX`
/// has no following day, so a `to_date` of `NaiveDate::MAX` leaves the range
/// open above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub limit: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl SaleFilter {
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persists a write-set and returns the new sale id.
    ///
    /// Each stock line is taken with a conditional decrement. If another sale
    /// got to the last units first, this one fails with `InsufficientStock`
    /// and the whole transaction rolls back.
    pub async fn create_sale(&self, write_set: &SaleWriteSet) -> EngineResult<i64> {
        let sale = &write_set.sale;
        let at = sale.created_at;

        let mut tx = self.pool.begin().await?;

        let sale_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sales (
                subtotal_usd, total_usd, total_bs, exchange_rate,
                discount_percent, notes, client_id, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'completed', ?8)
            RETURNING id
            "#,
        )
        .bind(sale.subtotal_usd.to_string())
        .bind(sale.total_usd.to_string())
        .bind(sale.total_bs.to_string())
        .bind(sale.exchange_rate.to_string())
        .bind(sale.discount_percent.to_string())
        .bind(sale.notes.as_deref())
        .bind(sale.client_id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;

        debug!(sale_id, payments = write_set.payments.payments().len(), "Inserting payments");

        for payment in write_set.payments.payments() {
            sqlx::query(
                r#"
                INSERT INTO sale_payments (sale_id, method, amount_usd, bank_code, reference, mon)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(sale_id)
            .bind(payment.method.as_str())
            .bind(payment.amount_usd.to_string())
            .bind(payment.bank_code.as_deref())
            .bind(payment.reference.as_deref())
            .bind(payment.mon.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        debug!(sale_id, items = write_set.items.len(), "Inserting sale items");

        for item in &write_set.items {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    sale_id, product_id, product_name, quantity, unit_price_usd, subtotal_usd
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(sale_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price_usd.to_string())
            .bind(item.subtotal_usd.to_string())
            .execute(&mut *tx)
            .await?;
        }

        // Stock first, then the movements built from what was observed.
        let mut observed = Vec::with_capacity(write_set.stock.len());
        for line in &write_set.stock {
            let Some(remaining) = decrement_stock(&mut *tx, line.product_id, line.quantity, at).await? else {
                let rejection = explain_shortage(&mut *tx, line.product_id, line.quantity).await?;
                warn!(
                    sale_id,
                    product_id = line.product_id,
                    requested = line.quantity,
                    code = rejection.code(),
                    "Stock gone before commit, rolling back sale"
                );
                return Err(rejection.into());
            };

            if remaining != line.expected_new {
                debug!(
                    product_id = line.product_id,
                    expected = line.expected_new,
                    remaining,
                    "Stock moved since snapshot"
                );
            }
            observed.push((line, remaining));
        }

        let reference = sale_reference(sale_id);
        for (line, remaining) in observed {
            let movement = NewMovement::stock_out(line.product_id, line.quantity, remaining + line.quantity, at)?
                .with_reference(reference.clone());
            append_movement(&mut *tx, &movement).await?;
        }

        tx.commit().await?;

        info!(
            sale_id,
            total_usd = %sale.total_usd,
            total_bs = %sale.total_bs,
            items = write_set.items.len(),
            units = write_set.units(),
            "Sale committed"
        );

        Ok(sale_id)
    }

    /// Voids a completed sale and puts its stock back.
    ///
    /// Quantities are added to whatever the counter holds now; they are never
    /// reset to a pre-sale value.
    pub async fn void_sale(&self, sale_id: i64, reason: Option<&str>) -> EngineResult<()> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if let Some(reason) = reason {
            validate_note("void reason", reason)?;
        }

        let at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let voided = sqlx::query(
            r#"
            UPDATE sales
            SET status = 'voided', voided_at = ?2, void_reason = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(sale_id)
        .bind(at)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        if voided.rows_affected() == 0 {
            let exists: Option<String> = sqlx::query_scalar("SELECT status FROM sales WHERE id = ?1")
                .bind(sale_id)
                .fetch_optional(&mut *tx)
                .await?;
            let rejection = match exists {
                Some(_) => SaleError::AlreadyVoided(sale_id),
                None => SaleError::SaleNotFound(sale_id),
            };
            warn!(sale_id, code = rejection.code(), "Void rejected");
            return Err(rejection.into());
        }

        let lines: Vec<(i64, i64)> =
            sqlx::query_as("SELECT product_id, quantity FROM sale_items WHERE sale_id = ?1 ORDER BY id")
                .bind(sale_id)
                .fetch_all(&mut *tx)
                .await?;

        let reference = return_reference(sale_id);
        for &(product_id, quantity) in &lines {
            let restored = increment_stock(&mut *tx, product_id, quantity, at)
                .await?
                .ok_or(SaleError::ProductNotFound { product_id })?;

            let movement = NewMovement::stock_in(product_id, quantity, restored - quantity, at)?
                .with_reference(reference.clone())
                .with_reason(reason.map(String::from));
            append_movement(&mut *tx, &movement).await?;
        }

        tx.commit().await?;

        info!(sale_id, lines = lines.len(), "Sale voided");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales s WHERE s.id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// A sale's lines, in the order they were rung up.
    pub async fn items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, product_name, quantity, unit_price_usd, subtotal_usd
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn payments(&self, sale_id: i64) -> DbResult<Vec<SalePayment>> {
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, method, amount_usd, bank_code, reference, mon
            FROM sale_payments
            WHERE sale_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// The sale with its items and payments, or `None`.
    pub async fn get_detail(&self, id: i64) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = self.items(id).await?;
        let payments = self.payments(id).await?;

        Ok(Some(SaleDetail { sale, items, payments }))
    }

    /// Newest sales first, with line count and client name.
    ///
    /// `filter.limit` falls back to `default_limit`; non-positive limits are
    /// treated as 1.
    pub async fn list(&self, filter: &SaleFilter, default_limit: i64) -> DbResult<Vec<SaleSummary>> {
        let limit = filter.limit.unwrap_or(default_limit).max(1);

        debug!(limit, from = ?filter.from_date, to = ?filter.to_date, "Listing sales");

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM sale_items i WHERE i.sale_id = s.id) AS item_count,
                c.name AS client_name
            FROM sales s
            LEFT JOIN clients c ON c.id = s.client_id
            WHERE 1 = 1
            "#,
            SALE_COLUMNS
        ));

        if let Some(from) = filter.from_date {
            query.push(" AND s.created_at >= ");
            query.push_bind(from.and_time(NaiveTime::MIN).and_utc());
        }
        if let Some(end) = filter.to_date.and_then(exclusive_day_end) {
            query.push(" AND s.created_at < ");
            query.push_bind(end);
        }

        query.push(" ORDER BY s.created_at DESC, s.id DESC LIMIT ");
        query.push_bind(limit);

        let sales = query.build_query_as::<SaleSummary>().fetch_all(&self.pool).await?;

        Ok(sales)
    }
}

/// Start of the day after `date`. `None` only for `NaiveDate::MAX`, where no
/// stored timestamp can lie past the end of the day anyway.
fn exclusive_day_end(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.succ_opt().map(|next| next.and_time(NaiveTime::MIN).and_utc())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use mercado_core::{build_sale, CartLine, ExchangeRate, Money, NewProduct, PaymentInput, SaleRequest};
    use rust_decimal_macros::dec;

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                name: "Pasta 500g".to_string(),
                list_price: Money::new(dec!(2.00)),
                quantity: 20,
                min_stock: 0,
            })
            .await
            .unwrap();
        (db, product.id)
    }

    async fn sell_at(db: &Database, product_id: i64, at: chrono::DateTime<Utc>) -> i64 {
        let products = db.products().get_by_ids(&[product_id]).await.unwrap();
        let request = SaleRequest::new(
            vec![CartLine::new(product_id, 1)],
            vec![PaymentInput::new("cash-usd", Money::new(dec!(2.00)))],
        );
        let write_set = build_sale(request, &products, ExchangeRate::new(dec!(40)).unwrap(), at).unwrap();
        db.sales().create_sale(&write_set).await.unwrap()
    }

    #[tokio::test]
    async fn test_detail_round_trip() {
        let (db, product_id) = setup().await;
        let id = sell_at(&db, product_id, Utc::now()).await;

        let detail = db.sales().get_detail(id).await.unwrap().unwrap();
        assert_eq!(detail.sale.total_usd.amount(), dec!(2.00));
        assert_eq!(detail.sale.total_bs.amount(), dec!(80.00));
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].product_name, "Pasta 500g");
        assert_eq!(detail.payments[0].method, mercado_core::PaymentMethod::CashUsd);

        assert!(db.sales().get_detail(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_day() {
        let (db, product_id) = setup().await;
        let today = Utc::now();
        let last_week = today - Duration::days(7);

        let old = sell_at(&db, product_id, last_week).await;
        let recent = sell_at(&db, product_id, today).await;

        let all = db.sales().list(&SaleFilter::default(), 100).await.unwrap();
        assert_eq!(all.iter().map(|s| s.sale.id).collect::<Vec<_>>(), vec![recent, old]);

        let day = last_week.date_naive();
        let only_old = db
            .sales()
            .list(&SaleFilter::default().between(day, day), 100)
            .await
            .unwrap();
        assert_eq!(only_old.len(), 1);
        assert_eq!(only_old[0].sale.id, old);
        assert_eq!(only_old[0].item_count, 1);
        assert_eq!(only_old[0].client_name, None);

        let one = db.sales().list(&SaleFilter::default().with_limit(1), 100).await.unwrap();
        assert_eq!(one[0].sale.id, recent);
    }

    #[tokio::test]
    async fn test_list_to_last_representable_day_is_open_above() {
        let (db, product_id) = setup().await;
        let today = Utc::now();
        let old = sell_at(&db, product_id, today - Duration::days(3)).await;
        let recent = sell_at(&db, product_id, today).await;

        let filter = SaleFilter::default().between(today.date_naive(), NaiveDate::MAX);
        let listed = db.sales().list(&filter, 100).await.unwrap();
        assert_eq!(listed.iter().map(|s| s.sale.id).collect::<Vec<_>>(), vec![recent]);

        let filter = SaleFilter {
            to_date: Some(NaiveDate::MAX),
            ..SaleFilter::default()
        };
        let listed = db.sales().list(&filter, 100).await.unwrap();
        assert_eq!(listed.iter().map(|s| s.sale.id).collect::<Vec<_>>(), vec![recent, old]);

        assert_eq!(exclusive_day_end(NaiveDate::MAX), None);
        let day = today.date_naive();
        assert_eq!(
            exclusive_day_end(day),
            day.succ_opt().map(|d| d.and_time(NaiveTime::MIN).and_utc())
        );
    }

    #[tokio::test]
    async fn test_void_reason_is_stored() {
        let (db, product_id) = setup().await;
        let id = sell_at(&db, product_id, Utc::now()).await;

        db.sales().void_sale(id, Some("  wrong item  ")).await.unwrap();

        let sale = db.sales().get_by_id(id).await.unwrap().unwrap();
        assert!(sale.is_voided());
        assert!(sale.voided_at.is_some());
        assert_eq!(sale.void_reason.as_deref(), Some("wrong item"));

        let returns = db.movements().by_reference(&return_reference(id)).await.unwrap();
        assert_eq!(returns[0].reason.as_deref(), Some("wrong item"));
    }
}
