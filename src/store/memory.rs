//! In-memory [`MealStore`] implementation for testing.
//!
//! Uses a `HashMap` keyed by cache key behind `std::sync::RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FoodError;
use crate::fingerprint::QuerySignature;
use crate::models::{CacheRecord, CachedQuery, SearchResult};

use super::MealStore;

pub struct InMemoryStore {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MealStore for InMemoryStore {
    async fn lookup(&self, sig: &QuerySignature) -> Result<Option<CacheRecord>, FoodError> {
        let records = self.records.read().map_err(FoodError::store_read)?;
        Ok(records.get(&sig.cache_key()).cloned())
    }

    async fn save(&self, sig: &QuerySignature, result: &SearchResult) -> Result<(), FoodError> {
        let mut records = self.records.write().map_err(FoodError::store_write)?;
        records.insert(
            sig.cache_key(),
            CacheRecord {
                signature: sig.clone(),
                result: result.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, sig: &QuerySignature) -> Result<bool, FoodError> {
        let mut records = self.records.write().map_err(FoodError::store_write)?;
        Ok(records.remove(&sig.cache_key()).is_some())
    }

    async fn list(&self) -> Result<Vec<CachedQuery>, FoodError> {
        let records = self.records.read().map_err(FoodError::store_read)?;
        let mut queries: Vec<CachedQuery> = records
            .iter()
            .map(|(key, record)| CachedQuery {
                cache_key: key.clone(),
                includes: record.signature.includes_id(),
                excludes: record.signature.excludes_id(),
                meal_count: record.result.meals.len() as i64,
                created_at: record.created_at.timestamp(),
            })
            .collect();
        queries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        Ok(queries)
    }
}
