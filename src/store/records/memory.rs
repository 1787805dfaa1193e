use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewProduct, Product, ProductPatch, ProductStore, RecordStore, User, UserStore};
use crate::store::StoreError;

/// In-memory users and products. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    users: Arc<RwLock<HashMap<String, User>>>,
    products: Arc<RwLock<Vec<Product>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn prepare(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }
}

#[async_trait]
impl UserStore for MemoryRecordStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.check_online()?;
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Ok(false);
        }
        users.insert(
            username.to_string(),
            User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            },
        );
        Ok(true)
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        self.check_online()?;
        match self.users.write().await.get_mut(username) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl ProductStore for MemoryRecordStore {
    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, StoreError> {
        self.check_online()?;
        let needle = search.filter(|s| !s.is_empty()).map(str::to_lowercase);
        let products = self.products.read().await;
        Ok(products
            .iter()
            .rev()
            .filter(|p| match &needle {
                Some(n) => p.name.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        self.check_online()?;
        let created = Product {
            id: Uuid::new_v4(),
            name: product.name,
            quantity: product.quantity,
            cost_price: product.cost_price,
            retail_price: product.retail_price,
            description: product.description,
            created_at: Utc::now(),
        };
        self.products.write().await.push(created.clone());
        Ok(created)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> Result<Option<Product>, StoreError> {
        self.check_online()?;
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|product| {
            patch.apply(product);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_online()?;
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            quantity: 1,
            cost_price: 1.0,
            retail_price: 2.0,
            description: None,
        }
    }

    #[tokio::test]
    async fn list_is_newest_first_and_searchable() {
        let store = MemoryRecordStore::new();
        store.insert_product(widget("Red Bolt")).await.unwrap();
        store.insert_product(widget("Blue Nut")).await.unwrap();
        store.insert_product(widget("bolt cutter")).await.unwrap();

        let all = store.list_products(None).await.unwrap();
        assert_eq!(all[0].name, "bolt cutter");

        let bolts = store.list_products(Some("BOLT")).await.unwrap();
        let names: Vec<_> = bolts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bolt cutter", "Red Bolt"]);
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let store = MemoryRecordStore::new();
        assert!(store.create_user("admin", "h1").await.unwrap());
        assert!(!store.create_user("admin", "h2").await.unwrap());
        assert_eq!(store.find_by_username("admin").await.unwrap().unwrap().password_hash, "h1");
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let store = MemoryRecordStore::new();
        let missing = Uuid::new_v4();
        assert!(store.update_product(missing, ProductPatch::default()).await.unwrap().is_none());
        assert!(!store.delete_product(missing).await.unwrap());
    }
}
