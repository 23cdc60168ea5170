//! Session storage for baskets.
//!
//! Baskets are keyed by `(session, prefix)` so one session can hold
//! several concurrent baskets (the shopper's own plus, say, a
//! backend-edited order). Every access goes through a per-key lock,
//! giving each key atomic read-modify-write.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::basket::Basket;

/// The default basket prefix for the customer-facing shop.
pub const DEFAULT_PREFIX: &str = "shop";

/// Process-wide basket store with per-key atomic read-modify-write.
#[derive(Clone, Default)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, Arc<Mutex<Basket>>>>>,
}

impl SessionStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(session: &str, prefix: &str) -> String {
        format!("{prefix}:{session}")
    }

    async fn entry(&self, session: &str, prefix: &str) -> Arc<Mutex<Basket>> {
        let key = Self::key(session, prefix);
        if let Some(entry) = self.entries.read().await.get(&key) {
            return entry.clone();
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Basket::new())))
            .clone()
    }

    /// Runs `f` against the basket under the key's lock, creating an
    /// empty basket on first access.
    ///
    /// The closure's result is returned; concurrent updates to the same
    /// key serialise, updates to different keys do not.
    pub async fn update<F, T>(&self, session: &str, prefix: &str, f: F) -> T
    where
        F: FnOnce(&mut Basket) -> T,
    {
        let entry = self.entry(session, prefix).await;
        let mut basket = entry.lock().await;
        f(&mut basket)
    }

    /// Locks the basket under the key, creating an empty basket on first
    /// access.
    ///
    /// The returned guard keeps the key's read-modify-write atomic across
    /// await points; drop it to release the key.
    pub async fn lock(&self, session: &str, prefix: &str) -> tokio::sync::OwnedMutexGuard<Basket> {
        self.entry(session, prefix).await.lock_owned().await
    }

    /// Returns a clone of the basket under the key, if present.
    pub async fn load(&self, session: &str, prefix: &str) -> Option<Basket> {
        let key = Self::key(session, prefix);
        let entry = self.entries.read().await.get(&key).cloned()?;
        let basket = entry.lock().await;
        Some(basket.clone())
    }

    /// Replaces the basket under the key.
    pub async fn put(&self, session: &str, prefix: &str, basket: Basket) {
        let entry = self.entry(session, prefix).await;
        *entry.lock().await = basket;
    }

    /// Removes the basket under the key.
    pub async fn remove(&self, session: &str, prefix: &str) {
        self.entries
            .write()
            .await
            .remove(&Self::key(session, prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{BasketItem, LineId};
    use catalog::ProductId;
    use common::Money;
    use std::collections::{BTreeMap, BTreeSet};

    fn item() -> BasketItem {
        BasketItem {
            id: LineId::new(),
            product_id: ProductId::new(),
            title: "Widget".to_string(),
            quantity: 1,
            unit_price: Money::from_major(10),
            sku_id: None,
            sku_code: None,
            variety_option_ids: BTreeSet::new(),
            labels: BTreeMap::new(),
            custom: BTreeMap::new(),
            categories: Vec::new(),
            collection_only: false,
            exempt_from_free_delivery: false,
            exempt_from_discount: false,
        }
    }

    #[tokio::test]
    async fn test_update_creates_on_first_access() {
        let store = SessionStore::new();
        let count = store
            .update("sess-1", DEFAULT_PREFIX, |basket| {
                basket.add_item(item(), 99).unwrap();
                basket.items().len()
            })
            .await;
        assert_eq!(count, 1);

        let basket = store.load("sess-1", DEFAULT_PREFIX).await.unwrap();
        assert_eq!(basket.items().len(), 1);
    }

    #[tokio::test]
    async fn test_prefixes_are_independent() {
        let store = SessionStore::new();
        store
            .update("sess-1", "shop", |basket| {
                basket.add_item(item(), 99).unwrap();
            })
            .await;
        store
            .update("sess-1", "backend", |basket| {
                assert!(basket.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_concurrent_updates_serialise() {
        let store = SessionStore::new();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update("sess-1", DEFAULT_PREFIX, |basket| {
                        basket.add_item(item(), 9999).unwrap();
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let basket = store.load("sess-1", DEFAULT_PREFIX).await.unwrap();
        assert_eq!(basket.items().len(), 20);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::new();
        store.update("sess-1", DEFAULT_PREFIX, |_| ()).await;
        store.remove("sess-1", DEFAULT_PREFIX).await;
        assert!(store.load("sess-1", DEFAULT_PREFIX).await.is_none());
    }
}
