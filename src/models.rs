//! Core data models used throughout Pantry Match.
//!
//! These types represent the provider records, ranked meals, and cached
//! results that flow through the lookup and ranking pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::QuerySignature;
use crate::normalize::IngredientKey;

/// Provider-assigned meal identifier.
pub type MealId = u64;

/// One ingredient line as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIngredient {
    pub name: String,
    pub amount: Option<f64>,
    pub unit: Option<String>,
}

/// A nutrient amount with its unit (e.g. `12.5 g`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub amount: f64,
    pub unit: String,
}

impl Nutrient {
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }
}

/// Per-serving nutrition summary. Missing values stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: Option<Nutrient>,
    pub carbs: Option<Nutrient>,
    pub protein: Option<Nutrient>,
}

/// Validated meal record returned by a provider gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMealData {
    pub id: MealId,
    pub title: String,
    pub image: String,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub ingredients: Vec<RawIngredient>,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientStatus {
    Present,
    Missing,
}

impl IngredientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Missing => "missing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "missing" => Some(Self::Missing),
            _ => None,
        }
    }
}

/// Display name in the source language beside its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualName {
    pub source: String,
    pub target: String,
}

impl BilingualName {
    /// Fallback used when translation fails: the original name in both slots.
    pub fn untranslated(name: &str) -> Self {
        Self {
            source: name.to_string(),
            target: name.to_string(),
        }
    }
}

/// An ingredient of a ranked meal, tagged against the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedIngredient {
    /// Normalized key; `None` when the provider name has no valid key.
    pub key: Option<IngredientKey>,
    pub name: String,
    pub status: IngredientStatus,
    /// Set for missing ingredients only.
    pub translation: Option<BilingualName>,
}

/// One ranked meal, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealCandidate {
    pub id: MealId,
    pub title: String,
    pub image: String,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub ingredients: Vec<TaggedIngredient>,
    pub nutrition: Nutrition,
    pub missing_count: usize,
}

impl MealCandidate {
    pub fn present(&self) -> impl Iterator<Item = &TaggedIngredient> {
        self.ingredients
            .iter()
            .filter(|i| i.status == IngredientStatus::Present)
    }

    pub fn missing(&self) -> impl Iterator<Item = &TaggedIngredient> {
        self.ingredients
            .iter()
            .filter(|i| i.status == IngredientStatus::Missing)
    }
}

/// Ranked shortlist for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub meals: Vec<MealCandidate>,
    /// Index into `meals` of the lowest-carbohydrate meal.
    pub min_carb_pick: Option<usize>,
    /// Index into `meals` of the highest-protein meal.
    pub max_protein_pick: Option<usize>,
    /// Non-fatal problems met while building the result.
    pub warnings: Vec<String>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.meals.is_empty()
    }

    pub fn min_carb(&self) -> Option<&MealCandidate> {
        self.min_carb_pick.and_then(|i| self.meals.get(i))
    }

    pub fn max_protein(&self) -> Option<&MealCandidate> {
        self.max_protein_pick.and_then(|i| self.meals.get(i))
    }
}

/// A persisted query and its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub signature: QuerySignature,
    pub result: SearchResult,
    pub created_at: DateTime<Utc>,
}

/// Lightweight summary of a cached query for listings.
#[derive(Debug, Clone, Serialize)]
pub struct CachedQuery {
    pub cache_key: String,
    pub includes: String,
    pub excludes: String,
    pub meal_count: i64,
    pub created_at: i64,
}
