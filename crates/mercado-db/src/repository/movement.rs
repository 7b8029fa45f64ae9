//! # Movement Repository
//!
//! The stock audit trail.
//!
//! ## Append-Only Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Writes:  append_movement(&mut conn, &NewMovement)                      │
//! │           └── the ONLY write; takes an in-transaction connection so a  │
//! │               movement is always committed with its quantity change    │
//! │                                                                         │
//! │  Reads:   MovementRepository (pool-backed, read-only)                  │
//! │           ├── for_product(id)                                          │
//! │           ├── by_reference("Sale #12")                                 │
//! │           └── recent(limit)                                            │
//! │                                                                         │
//! │  Storage: triggers abort any UPDATE or DELETE on movements             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use mercado_core::{Movement, NewMovement};

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, previous_quantity, \
     new_quantity, reference_number, reason, created_at";

/// Appends one movement on the given connection (normally `&mut *tx`).
///
/// The arithmetic is re-checked before insert.
pub async fn append_movement(conn: &mut SqliteConnection, movement: &NewMovement) -> DbResult<Movement> {
    movement.check()?;

    debug!(
        product_id = movement.product_id,
        movement_type = %movement.movement_type,
        quantity = movement.quantity,
        previous = movement.previous_quantity,
        new = movement.new_quantity,
        "Appending movement"
    );

    let sql = format!(
        r#"
        INSERT INTO movements (
            product_id, movement_type, quantity,
            previous_quantity, new_quantity,
            reference_number, reason, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    );

    let inserted = sqlx::query_as::<_, Movement>(&sql)
        .bind(movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.previous_quantity)
        .bind(movement.new_quantity)
        .bind(movement.reference_number.as_deref())
        .bind(movement.reason.as_deref())
        .bind(movement.created_at)
        .fetch_one(&mut *conn)
        .await?;

    Ok(inserted)
}

/// Read-only access to movements.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// A product's movements, oldest first.
    pub async fn for_product(&self, product_id: i64) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {} FROM movements WHERE product_id = ?1 ORDER BY id",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Movements carrying a reference such as `"Sale #12"`, oldest first.
    pub async fn by_reference(&self, reference: &str) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {} FROM movements WHERE reference_number = ?1 ORDER BY id",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Latest movements across all products, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<Movement>> {
        let sql = format!(
            "SELECT {} FROM movements ORDER BY id DESC LIMIT ?1",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, Movement>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// `Σ (new − previous)` for one product.
    pub async fn recorded_delta(&self, product_id: i64) -> DbResult<i64> {
        let delta: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(new_quantity - previous_quantity), 0) FROM movements WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(delta)
    }
}
