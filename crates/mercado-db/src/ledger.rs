//! # Stock Ledger
//!
//! Every write to `products.quantity` lives in this module, and every one of
//! them is paired with exactly one movement in the same transaction.
//!
//! ## Writers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation          Counter change                   Movement          │
//! │  ─────────────────  ───────────────────────────────  ────────────────  │
//! │  sale (per line)    quantity - n  (only if >= n)     out  "Sale #N"    │
//! │  void (per line)    quantity + n                     in   "Return …"   │
//! │  receive            quantity + n                     in                │
//! │  adjust_to          quantity = counted               adjustment        │
//! │  transfer_out       quantity - n  (only if >= n)     transfer          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The conditional decrement is a single statement:
//!
//! ```sql
//! UPDATE products SET quantity = quantity - ?1 ...
//! WHERE id = ?2 AND quantity >= ?1
//! RETURNING quantity
//! ```
//!
//! No row back means the stock was not there when the write happened, even if
//! it was there when the cart was priced.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbResult, EngineResult};
use crate::repository::movement::{append_movement, MovementRepository};
use mercado_core::validation::{validate_quantity, validate_stock_level};
use mercado_core::{LedgerCheck, Movement, NewMovement, Product, SaleError};

// =============================================================================
// In-Transaction Counter Writes
// =============================================================================

/// Takes `quantity` units if they are there. Returns the new counter, or
/// `None` when the product is missing or short.
pub(crate) async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let remaining: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET quantity = quantity - ?1, updated_at = ?3
        WHERE id = ?2 AND quantity >= ?1
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(remaining)
}

/// Adds `quantity` units. Returns the new counter, or `None` when the product
/// is missing.
pub(crate) async fn increment_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
    at: DateTime<Utc>,
) -> DbResult<Option<i64>> {
    let total: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products
        SET quantity = quantity + ?1, updated_at = ?3
        WHERE id = ?2
        RETURNING quantity
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(total)
}

/// Explains a failed conditional decrement: the product is gone, or short.
pub(crate) async fn explain_shortage(
    conn: &mut SqliteConnection,
    product_id: i64,
    requested: i64,
) -> DbResult<SaleError> {
    let row: Option<(String, i64)> = sqlx::query_as("SELECT name, quantity FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match row {
        Some((name, available)) => SaleError::InsufficientStock {
            product_id,
            name,
            available,
            requested,
        },
        None => SaleError::ProductNotFound { product_id },
    })
}

/// Touches the row first so the transaction holds the write lock before the
/// counter is read; the value returned cannot move until commit.
async fn lock_quantity(conn: &mut SqliteConnection, product_id: i64, at: DateTime<Utc>) -> DbResult<Option<i64>> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "UPDATE products SET updated_at = ?2 WHERE id = ?1 RETURNING quantity",
    )
    .bind(product_id)
    .bind(at)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity)
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Stock operations outside of sales, plus the consistency check.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Stock entering the shelf (a delivery, a found box).
    pub async fn receive(
        &self,
        product_id: i64,
        quantity: i64,
        reference: Option<&str>,
        reason: Option<&str>,
    ) -> EngineResult<Movement> {
        validate_quantity(quantity)?;

        let at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let new_quantity = increment_stock(&mut *tx, product_id, quantity, at)
            .await?
            .ok_or(SaleError::ProductNotFound { product_id })?;

        let mut draft = NewMovement::stock_in(product_id, quantity, new_quantity - quantity, at)?
            .with_reason(reason.map(String::from));
        if let Some(reference) = reference {
            draft = draft.with_reference(reference);
        }
        let movement = append_movement(&mut *tx, &draft).await?;

        tx.commit().await?;

        info!(product_id, quantity, new_quantity, "Stock received");
        Ok(movement)
    }

    /// Sets the counter to a physical count.
    ///
    /// Returns `None` (and writes nothing) when the count matches.
    pub async fn adjust_to(
        &self,
        product_id: i64,
        counted_quantity: i64,
        reason: Option<&str>,
    ) -> EngineResult<Option<Movement>> {
        validate_stock_level(counted_quantity)?;

        let at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let previous = lock_quantity(&mut *tx, product_id, at)
            .await?
            .ok_or(SaleError::ProductNotFound { product_id })?;

        let Some(draft) = NewMovement::adjustment(product_id, previous, counted_quantity, at)? else {
            debug!(product_id, quantity = previous, "Count matches, nothing to adjust");
            // Dropping the transaction rolls back the updated_at touch.
            return Ok(None);
        };
        let draft = draft.with_reason(reason.map(String::from));

        sqlx::query("UPDATE products SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(product_id)
            .bind(counted_quantity)
            .bind(at)
            .execute(&mut *tx)
            .await?;

        let movement = append_movement(&mut *tx, &draft).await?;

        tx.commit().await?;

        info!(
            product_id,
            previous,
            counted = counted_quantity,
            delta = movement.signed_delta(),
            "Stock adjusted"
        );
        Ok(Some(movement))
    }

    /// Stock sent to another location.
    pub async fn transfer_out(
        &self,
        product_id: i64,
        quantity: i64,
        reference: Option<&str>,
        reason: Option<&str>,
    ) -> EngineResult<Movement> {
        validate_quantity(quantity)?;

        let at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(remaining) = decrement_stock(&mut *tx, product_id, quantity, at).await? else {
            let rejection = explain_shortage(&mut *tx, product_id, quantity).await?;
            warn!(product_id, quantity, code = rejection.code(), "Transfer rejected");
            return Err(rejection.into());
        };

        let mut draft = NewMovement::transfer_out(product_id, quantity, remaining + quantity, at)?
            .with_reason(reason.map(String::from));
        if let Some(reference) = reference {
            draft = draft.with_reference(reference);
        }
        let movement = append_movement(&mut *tx, &draft).await?;

        tx.commit().await?;

        info!(product_id, quantity, remaining, "Stock transferred out");
        Ok(movement)
    }

    /// A product's movements, oldest first.
    pub async fn movements_for(&self, product_id: i64) -> DbResult<Vec<Movement>> {
        MovementRepository::new(self.pool.clone()).for_product(product_id).await
    }

    /// Latest movements across all products.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<Movement>> {
        MovementRepository::new(self.pool.clone()).recent(limit).await
    }

    /// Reconciles one product's counter against its movements.
    pub async fn verify(&self, product_id: i64) -> EngineResult<LedgerCheck> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                p.quantity,
                p.initial_quantity,
                COALESCE((SELECT SUM(m.new_quantity - m.previous_quantity)
                          FROM movements m WHERE m.product_id = p.id), 0)
            FROM products p
            WHERE p.id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let (quantity, initial_quantity, recorded) =
            row.ok_or(SaleError::ProductNotFound { product_id })?;

        let check = LedgerCheck::new(product_id, quantity - initial_quantity, recorded);
        if !check.consistent {
            warn!(
                product_id,
                expected = check.expected_delta,
                recorded = check.recorded_delta,
                "Ledger drift detected"
            );
        }
        Ok(check)
    }

    /// Reconciles every product. Drifted products come first.
    pub async fn verify_all(&self) -> DbResult<Vec<LedgerCheck>> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                p.id,
                p.quantity - p.initial_quantity,
                COALESCE((SELECT SUM(m.new_quantity - m.previous_quantity)
                          FROM movements m WHERE m.product_id = p.id), 0)
            FROM products p
            ORDER BY p.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut checks: Vec<LedgerCheck> = rows
            .into_iter()
            .map(|(id, expected, recorded)| LedgerCheck::new(id, expected, recorded))
            .collect();
        checks.sort_by_key(|c| c.consistent);

        Ok(checks)
    }

    /// Active products at or below their low-stock threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        crate::repository::product::ProductRepository::new(self.pool.clone())
            .low_stock()
            .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
