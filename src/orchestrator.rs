//! Cache orchestration.
//!
//! [`MealFinder`] answers a [`QuerySignature`] either from the local store or
//! by calling the provider, ranking the meals, and saving the result:
//!
//! ```text
//! Miss ──lookup hit──────────────────────────────▶ Resolved(Cache)
//!   │
//!   └──gateway (retry) ─▶ rank ─▶ save ──────────▶ Resolved(Provider)
//! ```
//!
//! The provider is called at most once per successful resolution. When the
//! gateway fails, ranking and saving are skipped and the store keeps whatever
//! it held before.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::FoodError;
use crate::fingerprint::QuerySignature;
use crate::models::{RawMealData, SearchResult};
use crate::provider::ProviderGateway;
use crate::ranking;
use crate::store::MealStore;
use crate::translate::{LanguagePair, Translator};

/// Where a resolved result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Provider,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Provider => "provider",
        }
    }
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub result: SearchResult,
    pub origin: Origin,
}

/// Retry settings for transient provider failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `backoff_ms × 2^(attempt-1)`,
    /// exponent capped at 5.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(5);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

pub struct MealFinder {
    store: Arc<dyn MealStore>,
    gateway: Arc<dyn ProviderGateway>,
    translator: Arc<dyn Translator>,
    languages: LanguagePair,
    max_results: usize,
    candidate_limit: usize,
    retry: RetryPolicy,
}

impl MealFinder {
    pub fn new(
        store: Arc<dyn MealStore>,
        gateway: Arc<dyn ProviderGateway>,
        translator: Arc<dyn Translator>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            gateway,
            translator,
            languages: LanguagePair::from(&config.translation),
            max_results: config.query.max_results,
            candidate_limit: config.provider.candidate_limit,
            retry: RetryPolicy {
                max_retries: config.provider.max_retries,
                backoff_ms: config.provider.retry_backoff_ms,
            },
        }
    }

    /// Override the retry policy (tests use a zero backoff).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn MealStore> {
        &self.store
    }

    /// Resolve `sig` to a ranked result.
    ///
    /// With `refresh` the stored record is ignored, recomputed, and
    /// overwritten.
    pub async fn resolve(&self, sig: &QuerySignature, refresh: bool) -> Result<Resolved, FoodError> {
        if !refresh {
            if let Some(record) = self.store.lookup(sig).await? {
                tracing::info!(
                    includes = %sig.includes_id(),
                    excludes = %sig.excludes_id(),
                    meals = record.result.meals.len(),
                    "cache hit"
                );
                return Ok(Resolved {
                    result: record.result,
                    origin: Origin::Cache,
                });
            }
            tracing::info!(includes = %sig.includes_id(), excludes = %sig.excludes_id(), "cache miss");
        } else {
            tracing::info!(includes = %sig.includes_id(), "refresh requested, skipping cache");
        }

        let raw_meals = self.fetch_with_retry(sig).await?;
        let fetched = raw_meals.len();

        let result = ranking::rank(
            raw_meals,
            sig,
            self.max_results,
            self.translator.as_ref(),
            &self.languages,
        )
        .await;
        tracing::debug!(fetched, kept = result.meals.len(), warnings = result.warnings.len(), "ranked meals");

        self.store.save(sig, &result).await?;

        Ok(Resolved {
            result,
            origin: Origin::Provider,
        })
    }

    async fn fetch_with_retry(&self, sig: &QuerySignature) -> Result<Vec<RawMealData>, FoodError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry.delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }

            match self
                .gateway
                .search(sig.includes(), sig.excludes(), self.candidate_limit)
                .await
            {
                Ok(meals) => return Ok(meals),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    tracing::warn!(
                        provider = self.gateway.name(),
                        attempt = attempt + 1,
                        error = %e,
                        "provider call failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
