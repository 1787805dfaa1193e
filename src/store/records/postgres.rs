use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

use super::{NewProduct, Product, ProductPatch, ProductStore, RecordStore, User, UserStore};
use crate::config::RecordsConfig;
use crate::store::StoreError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        quantity BIGINT NOT NULL DEFAULT 0,
        cost_price DOUBLE PRECISION NOT NULL DEFAULT 0,
        retail_price DOUBLE PRECISION NOT NULL DEFAULT 0,
        description TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

const PRODUCT_COLUMNS: &str = "id, name, quantity, cost_price, retail_price, description, created_at";

/// Postgres-backed users and products
pub struct PgRecordStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgRecordStore {
    /// Builds a lazily-connecting pool; nothing is dialed until first use.
    pub fn connect_lazy(config: &RecordsConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(&config.url)?;
        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn prepare(&self) -> Result<(), StoreError> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                info!("Record store schema ready");
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgRecordStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3)
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE username = $1")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductStore for PgRecordStore {
    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, StoreError> {
        let pattern = search.filter(|s| !s.is_empty()).map(like_pattern);
        let query = format!(
            "SELECT {} FROM products
             WHERE ($1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\\')
             ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&query)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let query = format!(
            "INSERT INTO products (id, name, quantity, cost_price, retail_price, description)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            PRODUCT_COLUMNS
        );
        let created = sqlx::query_as::<_, Product>(&query)
            .bind(Uuid::new_v4())
            .bind(product.name)
            .bind(product.quantity)
            .bind(product.cost_price)
            .bind(product.retail_price)
            .bind(product.description)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>, StoreError> {
        let query = format!(
            "UPDATE products SET
                name = COALESCE($2, name),
                quantity = COALESCE($3, quantity),
                cost_price = COALESCE($4, cost_price),
                retail_price = COALESCE($5, retail_price),
                description = COALESCE($6, description)
             WHERE id = $1
             RETURNING {}",
            PRODUCT_COLUMNS
        );
        let updated = sqlx::query_as::<_, Product>(&query)
            .bind(id)
            .bind(patch.name)
            .bind(patch.quantity)
            .bind(patch.cost_price)
            .bind(patch.retail_price)
            .bind(patch.description)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
