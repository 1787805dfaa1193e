//! Principal and product records.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// PHC-format Argon2id hash
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub cost_price: f64,
    pub retail_price: f64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// quantity * retail_price, two decimals
    pub fn total_price(&self) -> String {
        format!("{:.2}", self.quantity as f64 * self.retail_price)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub cost_price: f64,
    #[serde(default)]
    pub retail_price: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub cost_price: Option<f64>,
    pub retail_price: Option<f64>,
    pub description: Option<String>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(cost_price) = self.cost_price {
            product.cost_price = cost_price;
        }
        if let Some(retail_price) = self.retail_price {
            product.retail_price = retail_price;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Connects and creates whatever schema the store needs. Idempotent.
    async fn prepare(&self) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserStore: RecordStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Inserts unless the username is taken. Returns whether a row was created.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<bool, StoreError>;

    /// Returns whether a user matched.
    async fn update_password(&self, username: &str, password_hash: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ProductStore: RecordStore {
    /// Newest first, optionally filtered by case-insensitive name substring.
    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError>;

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>, StoreError>;

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError>;
}
