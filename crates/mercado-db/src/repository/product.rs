//! # Product Repository
//!
//! The engine's view of the product catalogue.
//!
//! ## Key Operations
//! - Batch lookup of a cart's products in one read
//! - Insert (sets the ledger baseline) and price updates
//!
//! Stock quantities are **not** written here. Every quantity change goes
//! through [`crate::ledger`] so it is paired with a movement.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mercado_core::validation::{validate_list_price, validate_product_name, validate_stock_level};
use mercado_core::{Money, NewProduct, Product, ValidationError};

const PRODUCT_COLUMNS: &str =
    "id, name, quantity, initial_quantity, list_price, min_stock, is_active, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let products = db.products().get_by_ids(&[1, 2, 3]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product whose id is in `ids`, in one query.
    ///
    /// Missing ids are simply absent from the result; the Sale Builder turns
    /// them into `ProductNotFound`.
    pub async fn get_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Loading product snapshot");

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM products WHERE id IN (", PRODUCT_COLUMNS));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let products = query.build_query_as::<Product>().fetch_all(&self.pool).await?;

        Ok(products)
    }

    /// Adds a product. Its starting quantity becomes `initial_quantity`, the
    /// baseline the ledger check measures against.
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        validate_product_name(&product.name).map_err(invalid)?;
        validate_list_price(product.list_price).map_err(invalid)?;
        validate_stock_level(product.quantity).map_err(invalid)?;
        validate_stock_level(product.min_stock).map_err(invalid)?;

        debug!(name = %product.name, quantity = product.quantity, "Inserting product");

        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO products (
                name, quantity, initial_quantity, list_price,
                min_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?2, ?3, ?4, 1, ?5, ?5)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );

        let inserted = sqlx::query_as::<_, Product>(&sql)
            .bind(product.name.trim())
            .bind(product.quantity)
            .bind(product.list_price.to_string())
            .bind(product.min_stock)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(inserted)
    }

    /// Changes a product's list price. Past sales keep their snapshot.
    pub async fn update_price(&self, id: i64, list_price: Money) -> DbResult<()> {
        validate_list_price(list_price).map_err(invalid)?;

        debug!(id, price = %list_price, "Updating list price");

        let result = sqlx::query("UPDATE products SET list_price = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(list_price.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Marks a product as no longer sellable.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Lists active products, by name.
    pub async fn list_active(&self, limit: i64) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Active products at or below their low-stock threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 AND quantity <= min_stock ORDER BY quantity, name",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql).fetch_all(&self.pool).await?;

        Ok(products)
    }

    /// Returns the total number of products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

fn invalid(err: ValidationError) -> DbError {
    DbError::CheckViolation {
        message: err.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use rust_decimal_macros::dec;

    fn new_product(name: &str, price: rust_decimal::Decimal, quantity: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            list_price: Money::new(price),
            quantity,
            min_stock: 2,
        }
    }

    #[tokio::test]
    async fn test_insert_sets_baseline() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = db
            .products()
            .insert(&new_product("Harina PAN 1kg", dec!(1.20), 30))
            .await
            .unwrap();

        assert_eq!(p.quantity, 30);
        assert_eq!(p.initial_quantity, 30);
        assert_eq!(p.list_price.amount(), dec!(1.20));
        assert!(p.is_active);

        let fetched = db.products().get_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(fetched, p);
    }

    #[tokio::test]
    async fn test_three_decimal_price_survives_storage() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let p = db
            .products()
            .insert(&new_product("Queso", dec!(3.335), 5))
            .await
            .unwrap();
        assert_eq!(p.list_price.amount(), dec!(3.335));
    }

    #[tokio::test]
    async fn test_get_by_ids() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let a = repo.insert(&new_product("A", dec!(1), 1)).await.unwrap();
        let b = repo.insert(&new_product("B", dec!(2), 1)).await.unwrap();
        repo.insert(&new_product("C", dec!(3), 1)).await.unwrap();

        let found = repo.get_by_ids(&[a.id, b.id, 999]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(repo.get_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_price() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let p = repo.insert(&new_product("Arroz", dec!(1.50), 10)).await.unwrap();

        repo.update_price(p.id, Money::new(dec!(1.75))).await.unwrap();
        let updated = repo.get_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(updated.list_price.amount(), dec!(1.75));

        assert!(matches!(
            repo.update_price(999, Money::new(dec!(1))).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(repo.update_price(p.id, Money::new(dec!(-1))).await.is_err());
    }

    #[tokio::test]
    async fn test_low_stock_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();
        let low = repo.insert(&new_product("Low", dec!(1), 2)).await.unwrap();
        repo.insert(&new_product("Plenty", dec!(1), 50)).await.unwrap();

        let flagged = repo.low_stock().await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].id, low.id);

        repo.deactivate(low.id).await.unwrap();
        assert!(repo.low_stock().await.unwrap().is_empty());
        assert_eq!(repo.list_active(10).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_validates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.products().insert(&new_product("  ", dec!(1), 1)).await.is_err());
        assert!(db.products().insert(&new_product("X", dec!(1), -1)).await.is_err());
    }
}
