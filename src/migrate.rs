use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema. Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per distinct query signature
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            cache_key TEXT PRIMARY KEY,
            includes_json TEXT NOT NULL,
            excludes_json TEXT NOT NULL,
            includes_id TEXT NOT NULL,
            excludes_id TEXT NOT NULL,
            min_carb_pick INTEGER,
            max_protein_pick INTEGER,
            warnings_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Ranked meals of each cached result
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_meals (
            cache_key TEXT NOT NULL,
            meal_rank INTEGER NOT NULL,
            meal_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            image TEXT NOT NULL,
            source_url TEXT,
            summary TEXT,
            missing_count INTEGER NOT NULL,
            calories_amount REAL,
            calories_unit TEXT,
            carbs_amount REAL,
            carbs_unit TEXT,
            protein_amount REAL,
            protein_unit TEXT,
            PRIMARY KEY (cache_key, meal_rank),
            FOREIGN KEY (cache_key) REFERENCES queries(cache_key) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Flattened present/missing ingredient lists
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS query_ingredients (
            cache_key TEXT NOT NULL,
            meal_rank INTEGER NOT NULL,
            position INTEGER NOT NULL,
            ingredient_key TEXT,
            name TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('present', 'missing')),
            source_name TEXT,
            target_name TEXT,
            PRIMARY KEY (cache_key, meal_rank, position),
            FOREIGN KEY (cache_key, meal_rank) REFERENCES query_meals(cache_key, meal_rank) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_created_at ON queries(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_query_ingredients_status ON query_ingredients(cache_key, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
