//! SQLite-backed [`MealStore`] implementation.
//!
//! A cached result is spread over three tables (see [`migrate`](crate::migrate)):
//! `queries` holds one row per signature, `query_meals` one row per ranked
//! meal, and `query_ingredients` the flattened ingredient lists with their
//! present/missing tags and translations.
//!
//! Saves delete and re-insert all rows of a signature inside a single
//! transaction, and lookups read all three tables inside one read
//! transaction, so readers see either the old record or the new one. A
//! process-local mutex funnels every mutation through one write path;
//! SQLite's file lock (with the busy timeout set in [`db`](crate::db))
//! serializes writers in other processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;

use crate::db;
use crate::error::FoodError;
use crate::fingerprint::QuerySignature;
use crate::migrate;
use crate::models::{
    BilingualName, CacheRecord, CachedQuery, IngredientStatus, MealCandidate, Nutrient, Nutrition,
    SearchResult, TaggedIngredient,
};
use crate::normalize::normalize;

use super::MealStore;

pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Connect to the database at `path` and make sure the schema exists.
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::migrate_pool(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn format_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn read_nutrient(row: &SqliteRow, prefix: &str) -> Option<Nutrient> {
    let amount: Option<f64> = row.get(format!("{}_amount", prefix).as_str());
    let unit: Option<String> = row.get(format!("{}_unit", prefix).as_str());
    amount.map(|amount| Nutrient {
        amount,
        unit: unit.unwrap_or_default(),
    })
}

fn pick_to_db(pick: Option<usize>) -> Option<i64> {
    pick.map(|p| p as i64)
}

fn pick_from_db(pick: Option<i64>) -> Option<usize> {
    pick.and_then(|p| usize::try_from(p).ok())
}

async fn delete_rows(tx: &mut Transaction<'_, Sqlite>, cache_key: &str) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM query_ingredients WHERE cache_key = ?")
        .bind(cache_key)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM query_meals WHERE cache_key = ?")
        .bind(cache_key)
        .execute(&mut **tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM queries WHERE cache_key = ?")
        .bind(cache_key)
        .execute(&mut **tx)
        .await?;
    Ok(deleted.rows_affected())
}

async fn insert_meal(
    tx: &mut Transaction<'_, Sqlite>,
    cache_key: &str,
    rank: i64,
    meal: &MealCandidate,
) -> Result<(), sqlx::Error> {
    let n = &meal.nutrition;
    sqlx::query(
        r#"
        INSERT INTO query_meals (cache_key, meal_rank, meal_id, title, image, source_url, summary,
                                 missing_count, calories_amount, calories_unit, carbs_amount,
                                 carbs_unit, protein_amount, protein_unit)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cache_key)
    .bind(rank)
    .bind(meal.id as i64)
    .bind(&meal.title)
    .bind(&meal.image)
    .bind(&meal.source_url)
    .bind(&meal.summary)
    .bind(meal.missing_count as i64)
    .bind(n.calories.as_ref().map(|v| v.amount))
    .bind(n.calories.as_ref().map(|v| v.unit.as_str()))
    .bind(n.carbs.as_ref().map(|v| v.amount))
    .bind(n.carbs.as_ref().map(|v| v.unit.as_str()))
    .bind(n.protein.as_ref().map(|v| v.amount))
    .bind(n.protein.as_ref().map(|v| v.unit.as_str()))
    .execute(&mut **tx)
    .await?;

    for (position, ing) in meal.ingredients.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO query_ingredients (cache_key, meal_rank, position, ingredient_key, name,
                                           status, source_name, target_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(cache_key)
        .bind(rank)
        .bind(position as i64)
        .bind(ing.key.as_ref().map(|k| k.as_str()))
        .bind(&ing.name)
        .bind(ing.status.as_str())
        .bind(ing.translation.as_ref().map(|t| t.source.as_str()))
        .bind(ing.translation.as_ref().map(|t| t.target.as_str()))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn ingredient_from_row(row: &SqliteRow) -> Result<TaggedIngredient, FoodError> {
    let stored_key: Option<String> = row.get("ingredient_key");
    // Stored keys are already normalized; normalizing again is a no-op that
    // turns them back into typed keys.
    let key = stored_key
        .map(|k| normalize(&k))
        .transpose()
        .map_err(FoodError::store_read)?;

    let status_text: String = row.get("status");
    let status = IngredientStatus::parse(&status_text).ok_or_else(|| {
        FoodError::store_read(format!("unknown ingredient status '{}'", status_text))
    })?;

    let source: Option<String> = row.get("source_name");
    let target: Option<String> = row.get("target_name");
    let translation = match (source, target) {
        (Some(source), Some(target)) => Some(BilingualName { source, target }),
        _ => None,
    };

    Ok(TaggedIngredient {
        key,
        name: row.get("name"),
        status,
        translation,
    })
}

#[async_trait]
impl MealStore for SqliteStore {
    async fn lookup(&self, sig: &QuerySignature) -> Result<Option<CacheRecord>, FoodError> {
        let cache_key = sig.cache_key();

        // All three SELECTs must see the same WAL snapshot.
        let mut tx = self.pool.begin().await.map_err(FoodError::store_read)?;

        let query_row = sqlx::query(
            "SELECT min_carb_pick, max_protein_pick, warnings_json, created_at FROM queries WHERE cache_key = ?",
        )
        .bind(&cache_key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(FoodError::store_read)?;

        let query_row = match query_row {
            Some(row) => row,
            None => return Ok(None),
        };

        let meal_rows = sqlx::query(
            r#"
            SELECT meal_rank, meal_id, title, image, source_url, summary, missing_count,
                   calories_amount, calories_unit, carbs_amount, carbs_unit,
                   protein_amount, protein_unit
            FROM query_meals WHERE cache_key = ? ORDER BY meal_rank ASC
            "#,
        )
        .bind(&cache_key)
        .fetch_all(&mut *tx)
        .await
        .map_err(FoodError::store_read)?;

        let ingredient_rows = sqlx::query(
            r#"
            SELECT meal_rank, ingredient_key, name, status, source_name, target_name
            FROM query_ingredients WHERE cache_key = ? ORDER BY meal_rank ASC, position ASC
            "#,
        )
        .bind(&cache_key)
        .fetch_all(&mut *tx)
        .await
        .map_err(FoodError::store_read)?;

        tx.commit().await.map_err(FoodError::store_read)?;

        let mut ingredients_by_rank: BTreeMap<i64, Vec<TaggedIngredient>> = BTreeMap::new();
        for row in &ingredient_rows {
            let rank: i64 = row.get("meal_rank");
            ingredients_by_rank
                .entry(rank)
                .or_default()
                .push(ingredient_from_row(row)?);
        }

        let meals = meal_rows
            .iter()
            .map(|row| {
                let rank: i64 = row.get("meal_rank");
                let meal_id: i64 = row.get("meal_id");
                let missing_count: i64 = row.get("missing_count");
                MealCandidate {
                    id: meal_id as u64,
                    title: row.get("title"),
                    image: row.get("image"),
                    source_url: row.get("source_url"),
                    summary: row.get("summary"),
                    ingredients: ingredients_by_rank.remove(&rank).unwrap_or_default(),
                    nutrition: Nutrition {
                        calories: read_nutrient(row, "calories"),
                        carbs: read_nutrient(row, "carbs"),
                        protein: read_nutrient(row, "protein"),
                    },
                    missing_count: missing_count as usize,
                }
            })
            .collect();

        let warnings_json: String = query_row.get("warnings_json");
        let warnings: Vec<String> =
            serde_json::from_str(&warnings_json).map_err(FoodError::store_read)?;

        Ok(Some(CacheRecord {
            signature: sig.clone(),
            result: SearchResult {
                meals,
                min_carb_pick: pick_from_db(query_row.get("min_carb_pick")),
                max_protein_pick: pick_from_db(query_row.get("max_protein_pick")),
                warnings,
            },
            created_at: format_ts(query_row.get("created_at")),
        }))
    }

    async fn save(&self, sig: &QuerySignature, result: &SearchResult) -> Result<(), FoodError> {
        let cache_key = sig.cache_key();
        let includes_json = serde_json::to_string(sig.includes()).map_err(FoodError::store_write)?;
        let excludes_json = serde_json::to_string(sig.excludes()).map_err(FoodError::store_write)?;
        let warnings_json = serde_json::to_string(&result.warnings).map_err(FoodError::store_write)?;
        let now = Utc::now().timestamp();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(FoodError::store_write)?;

        delete_rows(&mut tx, &cache_key)
            .await
            .map_err(FoodError::store_write)?;

        sqlx::query(
            r#"
            INSERT INTO queries (cache_key, includes_json, excludes_json, includes_id, excludes_id,
                                 min_carb_pick, max_protein_pick, warnings_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&cache_key)
        .bind(&includes_json)
        .bind(&excludes_json)
        .bind(sig.includes_id())
        .bind(sig.excludes_id())
        .bind(pick_to_db(result.min_carb_pick))
        .bind(pick_to_db(result.max_protein_pick))
        .bind(&warnings_json)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(FoodError::store_write)?;

        for (rank, meal) in result.meals.iter().enumerate() {
            insert_meal(&mut tx, &cache_key, rank as i64, meal)
                .await
                .map_err(FoodError::store_write)?;
        }

        tx.commit().await.map_err(FoodError::store_write)?;
        tracing::debug!(cache_key = %cache_key, meals = result.meals.len(), "saved cache record");
        Ok(())
    }

    async fn delete(&self, sig: &QuerySignature) -> Result<bool, FoodError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(FoodError::store_write)?;
        let deleted = delete_rows(&mut tx, &sig.cache_key())
            .await
            .map_err(FoodError::store_write)?;
        tx.commit().await.map_err(FoodError::store_write)?;
        Ok(deleted > 0)
    }

    async fn list(&self) -> Result<Vec<CachedQuery>, FoodError> {
        let rows = sqlx::query(
            r#"
            SELECT q.cache_key, q.includes_id, q.excludes_id, q.created_at,
                   COUNT(m.meal_rank) AS meal_count
            FROM queries q
            LEFT JOIN query_meals m ON m.cache_key = q.cache_key
            GROUP BY q.cache_key
            ORDER BY q.created_at DESC, q.cache_key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(FoodError::store_read)?;

        Ok(rows
            .iter()
            .map(|row| CachedQuery {
                cache_key: row.get("cache_key"),
                includes: row.get("includes_id"),
                excludes: row.get("excludes_id"),
                meal_count: row.get("meal_count"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
