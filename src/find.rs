//! The `find` command: ingredients in, ranked meals and an HTML page out.
//!
//! [`find_food`] is the library entry point. It builds the signature (which
//! rejects bad input before any I/O), resolves it through the cache
//! orchestrator backed by the configured store, provider, and translator,
//! and writes `{output.dir}/{file_stem}.html`. Any failure before the write
//! leaves no artifact behind.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::FoodError;
use crate::fingerprint::{build_signature, ExclusionPolicy, QuerySignature};
use crate::models::SearchResult;
use crate::orchestrator::{MealFinder, Origin};
use crate::provider::create_gateway;
use crate::render::{render_html, write_artifact};
use crate::store::SqliteStore;
use crate::translate::create_translator;

#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    /// Use the caller's excludes verbatim instead of merging the configured defaults.
    pub override_exclusions: bool,
    /// Ignore any cached record and recompute it.
    pub refresh: bool,
}

#[derive(Debug, Clone)]
pub struct FindOutcome {
    pub signature: QuerySignature,
    pub result: SearchResult,
    pub origin: Origin,
    pub artifact: PathBuf,
}

/// Build the signature for raw CLI input under the configured exclusion policy.
pub fn query_signature<S: AsRef<str>>(
    config: &Config,
    includes: &[S],
    excludes: &[S],
    override_exclusions: bool,
) -> Result<QuerySignature, FoodError> {
    let policy = if override_exclusions {
        ExclusionPolicy::Override
    } else {
        ExclusionPolicy::merge_defaults(&config.query.default_exclusions)?
    };
    build_signature(includes, excludes, &policy)
}

/// Resolve `sig` with an already-wired finder and write its artifact.
pub async fn find_with(
    finder: &MealFinder,
    output_dir: &Path,
    sig: QuerySignature,
    refresh: bool,
) -> Result<FindOutcome> {
    let resolved = finder.resolve(&sig, refresh).await?;
    let html = render_html(&sig, &resolved.result);
    let artifact = write_artifact(output_dir, &sig, &html)?;
    tracing::info!(
        origin = resolved.origin.as_str(),
        meals = resolved.result.meals.len(),
        artifact = %artifact.display(),
        "query resolved"
    );

    Ok(FindOutcome {
        signature: sig,
        result: resolved.result,
        origin: resolved.origin,
        artifact,
    })
}

/// Find meals for `includes`, avoiding `excludes`, and write the HTML page.
pub async fn find_food<S: AsRef<str>>(
    config: &Config,
    includes: &[S],
    excludes: &[S],
    options: FindOptions,
) -> Result<FindOutcome> {
    let sig = query_signature(config, includes, excludes, options.override_exclusions)?;

    let store = Arc::new(SqliteStore::open(&config.db.path).await?);
    let gateway = create_gateway(&config.provider)?;
    let translator = create_translator(&config.translation)?;
    let finder = MealFinder::new(store.clone(), gateway, translator, config);

    let outcome = find_with(&finder, &config.output.dir, sig, options.refresh).await;
    store.close().await;
    outcome
}

/// CLI entry point: run [`find_food`] and print a short summary.
pub async fn run_find(
    config: &Config,
    includes: &[String],
    excludes: &[String],
    options: FindOptions,
) -> Result<()> {
    let outcome = find_food(config, includes, excludes, options).await?;
    let result = &outcome.result;

    if result.is_empty() {
        println!("No meals found ({})", outcome.origin.as_str());
    } else {
        println!(
            "Found {} meal(s) ({})",
            result.meals.len(),
            outcome.origin.as_str()
        );
        for (i, meal) in result.meals.iter().enumerate() {
            println!(
                "{}. {} [id {}] missing {}",
                i + 1,
                meal.title,
                meal.id,
                meal.missing_count
            );
        }
        if let Some(meal) = result.min_carb() {
            println!("Lowest carbohydrates: {}", meal.title);
        }
        if let Some(meal) = result.max_protein() {
            println!("Highest protein:      {}", meal.title);
        }
    }
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }
    println!("Saved {}", outcome.artifact.display());

    Ok(())
}
