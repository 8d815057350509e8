//! Inspection of the local cache: `pantry cached list|show|forget`.
//!
//! These commands only read or delete stored records; they never call the
//! provider.

use anyhow::Result;

use crate::config::Config;
use crate::find::query_signature;
use crate::models::CacheRecord;
use crate::store::{MealStore, SqliteStore};

/// Print every cached query, newest first.
pub async fn run_list(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db.path).await?;
    let queries = store.list().await?;
    store.close().await;

    if queries.is_empty() {
        println!("No cached queries.");
        return Ok(());
    }

    println!("{:<20} {:>5}  {:<30} EXCLUDES", "CREATED", "MEALS", "INCLUDES");
    for q in &queries {
        println!(
            "{:<20} {:>5}  {:<30} {}",
            format_ts(q.created_at),
            q.meal_count,
            q.includes,
            if q.excludes.is_empty() { "-" } else { q.excludes.as_str() }
        );
    }
    println!();
    println!("{} cached quer{}", queries.len(), if queries.len() == 1 { "y" } else { "ies" });
    Ok(())
}

/// Print the cached record for a query, or fail when it is not cached.
pub async fn run_show(
    config: &Config,
    includes: &[String],
    excludes: &[String],
    override_exclusions: bool,
    json: bool,
) -> Result<()> {
    let sig = query_signature(config, includes, excludes, override_exclusions)?;
    let store = SqliteStore::open(&config.db.path).await?;
    let record = store.lookup(&sig).await?;
    store.close().await;

    let record = match record {
        Some(r) => r,
        None => anyhow::bail!(
            "No cached result for '{}' excluding '{}'",
            sig.includes_id(),
            sig.excludes_id()
        ),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

/// Remove the cached record for a query.
pub async fn run_forget(
    config: &Config,
    includes: &[String],
    excludes: &[String],
    override_exclusions: bool,
) -> Result<()> {
    let sig = query_signature(config, includes, excludes, override_exclusions)?;
    let store = SqliteStore::open(&config.db.path).await?;
    let removed = store.delete(&sig).await?;
    store.close().await;

    if removed {
        println!("Forgot cached result for '{}'", sig.includes_id());
    } else {
        println!("Nothing cached for '{}'", sig.includes_id());
    }
    Ok(())
}

fn print_record(record: &CacheRecord) {
    let sig = &record.signature;
    println!("includes:   {}", sig.includes_id());
    println!("excludes:   {}", sig.excludes_id());
    println!("cached at:  {}", format_ts(record.created_at.timestamp()));
    println!();

    let result = &record.result;
    if result.is_empty() {
        println!("(no meals)");
    }
    for (i, meal) in result.meals.iter().enumerate() {
        let mut tags = Vec::new();
        if result.min_carb_pick == Some(i) {
            tags.push("min-carb");
        }
        if result.max_protein_pick == Some(i) {
            tags.push("max-protein");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", tags.join(", "))
        };

        println!("{}. {} (id {}){}", i + 1, meal.title, meal.id, tags);
        let missing: Vec<String> = meal
            .missing()
            .map(|ing| match &ing.translation {
                Some(pair) => format!("{} ({})", pair.source, pair.target),
                None => ing.name.clone(),
            })
            .collect();
        if !missing.is_empty() {
            println!("   missing: {}", missing.join(", "));
        }
    }

    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}
