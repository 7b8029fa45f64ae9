//! # Client Repository
//!
//! A minimal client registry. Sales point at clients weakly: deleting a
//! client keeps its sales and nulls their `client_id` (`ON DELETE SET NULL`).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use mercado_core::validation::validate_name;
use mercado_core::Client;

/// Fields needed to register a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub document_id: Option<String>,
    pub phone: Option<String>,
}

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    pub async fn insert(&self, client: &NewClient) -> DbResult<Client> {
        validate_name("client name", &client.name).map_err(|e| DbError::CheckViolation {
            message: e.to_string(),
        })?;

        debug!(name = %client.name, "Inserting client");

        let inserted = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (name, document_id, phone, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, name, document_id, phone, created_at
            "#,
        )
        .bind(client.name.trim())
        .bind(client.document_id.as_deref())
        .bind(client.phone.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, name, document_id, phone, created_at FROM clients WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(client)
    }

    /// Deletes a client. Its sales remain, with `client_id` set to NULL.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting client");

        let result = sqlx::query("DELETE FROM clients WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Client", id));
        }

        Ok(())
    }
}
