//! Matching and ranking of provider meals against a query.
//!
//! # Algorithm
//!
//! 1. Tag every ingredient of every meal as present (its key is included)
//!    or missing. Repeated keys within one meal count once.
//! 2. Drop meals that list an excluded ingredient.
//! 3. Sort by missing count (asc), calories (asc, unknown last), id (asc).
//! 4. Truncate to `max_results`.
//! 5. Pick the lowest-carbohydrate and highest-protein meals (ties: lowest id).
//! 6. Translate the missing-ingredient names of the survivors.
//!
//! Steps 1–5 are pure ([`select_top`], [`assemble`]). Only step 6 awaits,
//! and it runs before any [`MealCandidate`] is built.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::fingerprint::QuerySignature;
use crate::models::{
    BilingualName, IngredientStatus, MealCandidate, MealId, Nutrient, RawMealData, SearchResult,
    TaggedIngredient,
};
use crate::normalize::normalize;
use crate::translate::{translate_names, LanguagePair, Translator};

/// A meal that survived filtering, tagged but not yet translated.
#[derive(Debug, Clone)]
pub struct ScoredMeal {
    pub meal: RawMealData,
    pub ingredients: Vec<TaggedIngredient>,
    pub missing_count: usize,
}

impl ScoredMeal {
    fn calories(&self) -> Option<f64> {
        self.meal.nutrition.calories.as_ref().map(|n| n.amount)
    }
}

/// Tag a meal's ingredients against the include set.
///
/// Returns `None` when the meal lists an excluded ingredient.
pub fn score_meal(meal: RawMealData, sig: &QuerySignature) -> Option<ScoredMeal> {
    let mut seen_keys = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut ingredients = Vec::with_capacity(meal.ingredients.len());

    for raw in &meal.ingredients {
        let key = normalize(&raw.name).ok();
        match &key {
            Some(k) => {
                if sig.excludes().contains(k) {
                    tracing::debug!(meal = meal.id, ingredient = %k, "dropping meal with excluded ingredient");
                    return None;
                }
                if !seen_keys.insert(k.clone()) {
                    continue;
                }
            }
            None => {
                if !seen_names.insert(raw.name.clone()) {
                    continue;
                }
            }
        }

        let status = match &key {
            Some(k) if sig.includes().contains(k) => IngredientStatus::Present,
            _ => IngredientStatus::Missing,
        };
        ingredients.push(TaggedIngredient {
            key,
            name: raw.name.clone(),
            status,
            translation: None,
        });
    }

    let missing_count = ingredients
        .iter()
        .filter(|i| i.status == IngredientStatus::Missing)
        .count();

    Some(ScoredMeal {
        meal,
        ingredients,
        missing_count,
    })
}

fn compare_calories(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter, sort, and truncate. Duplicate meal ids keep their first record.
pub fn select_top(
    raw_meals: Vec<RawMealData>,
    sig: &QuerySignature,
    max_results: usize,
) -> Vec<ScoredMeal> {
    let mut seen_ids: HashSet<MealId> = HashSet::new();
    let mut scored: Vec<ScoredMeal> = raw_meals
        .into_iter()
        .filter(|meal| seen_ids.insert(meal.id))
        .filter_map(|meal| score_meal(meal, sig))
        .collect();

    scored.sort_by(|a, b| {
        a.missing_count
            .cmp(&b.missing_count)
            .then_with(|| compare_calories(a.calories(), b.calories()))
            .then_with(|| a.meal.id.cmp(&b.meal.id))
    });
    scored.truncate(max_results);
    scored
}

/// Names of every missing ingredient across the selected meals.
pub fn missing_names(scored: &[ScoredMeal]) -> BTreeSet<String> {
    scored
        .iter()
        .flat_map(|s| s.ingredients.iter())
        .filter(|i| i.status == IngredientStatus::Missing)
        .map(|i| i.name.clone())
        .collect()
}

fn pick_by<F>(meals: &[MealCandidate], nutrient: F, prefer_high: bool) -> Option<usize>
where
    F: Fn(&MealCandidate) -> Option<&Nutrient>,
{
    meals
        .iter()
        .enumerate()
        .filter_map(|(idx, meal)| nutrient(meal).map(|n| (idx, n.amount, meal.id)))
        .min_by(|(_, a, id_a), (_, b, id_b)| {
            let by_amount = if prefer_high {
                b.total_cmp(a)
            } else {
                a.total_cmp(b)
            };
            by_amount.then_with(|| id_a.cmp(id_b))
        })
        .map(|(idx, _, _)| idx)
}

pub fn pick_min_carb(meals: &[MealCandidate]) -> Option<usize> {
    pick_by(meals, |m| m.nutrition.carbs.as_ref(), false)
}

pub fn pick_max_protein(meals: &[MealCandidate]) -> Option<usize> {
    pick_by(meals, |m| m.nutrition.protein.as_ref(), true)
}

/// Build the final result from selected meals and resolved translations.
///
/// Missing ingredients without an entry in `translations` fall back to the
/// untranslated pair.
pub fn assemble(
    scored: Vec<ScoredMeal>,
    translations: &BTreeMap<String, BilingualName>,
    warnings: Vec<String>,
) -> SearchResult {
    let meals: Vec<MealCandidate> = scored
        .into_iter()
        .map(|s| {
            let ingredients = s
                .ingredients
                .into_iter()
                .map(|mut ing| {
                    if ing.status == IngredientStatus::Missing {
                        ing.translation = Some(
                            translations
                                .get(&ing.name)
                                .cloned()
                                .unwrap_or_else(|| BilingualName::untranslated(&ing.name)),
                        );
                    }
                    ing
                })
                .collect();
            MealCandidate {
                id: s.meal.id,
                title: s.meal.title,
                image: s.meal.image,
                source_url: s.meal.source_url,
                summary: s.meal.summary,
                ingredients,
                nutrition: s.meal.nutrition,
                missing_count: s.missing_count,
            }
        })
        .collect();

    SearchResult {
        min_carb_pick: pick_min_carb(&meals),
        max_protein_pick: pick_max_protein(&meals),
        meals,
        warnings,
    }
}

/// Rank provider meals for a query and annotate missing names bilingually.
pub async fn rank(
    raw_meals: Vec<RawMealData>,
    sig: &QuerySignature,
    max_results: usize,
    translator: &dyn Translator,
    languages: &LanguagePair,
) -> SearchResult {
    let scored = select_top(raw_meals, sig, max_results);
    let names = missing_names(&scored);
    let (translations, warnings) = translate_names(translator, languages, &names).await;
    assemble(scored, &translations, warnings)
}
