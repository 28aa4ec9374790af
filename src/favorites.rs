// Favorites list and user profile kept in a string key-value store

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::place_id_codec;
use crate::rent_abstraction::RentSearchResult;

pub const FAVORITES_KEY: &str = "favoriteItems";
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, String>,
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|value| value.clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteItem {
    pub name: String,
    pub image: Option<String>,
}

// Favorites keyed by encoded place token
pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
}

impl Favorites {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn items(&self) -> BTreeMap<String, FavoriteItem> {
        let Some(raw) = self.store.get(FAVORITES_KEY) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!("Ignoring unreadable favorites: {}", e);
                BTreeMap::new()
            }
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.items().contains_key(token)
    }

    pub fn count(&self) -> usize {
        self.items().len()
    }

    // Returns whether `result` is a favorite after the toggle
    pub fn toggle(&self, result: &RentSearchResult) -> Result<bool, StoreError> {
        let token = place_id_codec::encode(result);
        let mut items = self.items();

        let added = if items.remove(&token).is_some() {
            false
        } else {
            items.insert(
                token,
                FavoriteItem {
                    name: result.name.clone(),
                    image: result.image.first().cloned(),
                },
            );
            true
        };

        self.store.set(FAVORITES_KEY, serde_json::to_string(&items)?);
        Ok(added)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub avatar_url: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            username: "Wade Warren".to_string(),
            avatar_url: "/img/avatar.png".to_string(),
        }
    }
}

impl UserProfile {
    // Missing or unreadable profiles fall back to the default user
    pub fn load(store: &dyn KeyValueStore) -> Self {
        store
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(USER_KEY, serde_json::to_string(self)?);
        Ok(())
    }
}
