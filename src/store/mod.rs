//! Storage abstraction for cached queries.
//!
//! The [`MealStore`] trait defines the operations the cache orchestrator
//! needs, enabling pluggable backends:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteStore`] | Persistent cache shared across runs and processes |
//! | [`InMemoryStore`] | Tests and throwaway sessions |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::FoodError;
use crate::fingerprint::QuerySignature;
use crate::models::{CacheRecord, CachedQuery, SearchResult};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Persistent mapping from [`QuerySignature`] to [`CacheRecord`].
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`lookup`](MealStore::lookup) | Read the record for a signature, if any |
/// | [`save`](MealStore::save) | Insert or replace the record for a signature |
/// | [`delete`](MealStore::delete) | Remove the record for a signature |
/// | [`list`](MealStore::list) | Summaries of all cached queries |
#[async_trait]
pub trait MealStore: Send + Sync {
    /// Read the cached record for `sig`. Never touches the network.
    async fn lookup(&self, sig: &QuerySignature) -> Result<Option<CacheRecord>, FoodError>;

    /// Insert or replace the record for `sig`.
    ///
    /// All-or-nothing: on error the previous record, if any, is intact.
    async fn save(&self, sig: &QuerySignature, result: &SearchResult) -> Result<(), FoodError>;

    /// Remove the record for `sig`. Returns whether one existed.
    async fn delete(&self, sig: &QuerySignature) -> Result<bool, FoodError>;

    /// List every cached query, newest first.
    async fn list(&self) -> Result<Vec<CachedQuery>, FoodError>;
}
