//! Ingredient normalization.
//!
//! Turns free-form ingredient text ("Cherry Tomatoes", " eggs ") into a
//! stable [`IngredientKey`] that is used for matching, cache keys, and
//! artifact file names.
//!
//! # Rules
//!
//! 1. Trim and lowercase.
//! 2. Replace each run of whitespace with a single `-`.
//! 3. Drop every character outside `[a-zA-Z0-9_-]`.
//! 4. Reject the input if nothing is left.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::FoodError;

/// Canonical ingredient identifier matching `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientKey(String);

impl IngredientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IngredientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IngredientKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Normalize a raw ingredient string.
///
/// Pure and idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(raw: &str) -> Result<IngredientKey, FoodError> {
    let lowered = raw.trim().to_lowercase();

    let mut key = String::with_capacity(lowered.len());
    let mut in_whitespace = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                key.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if is_key_char(c) {
            key.push(c);
        }
    }

    if key.is_empty() {
        return Err(FoodError::invalid_ingredient(
            raw,
            "nothing left after stripping unsupported characters",
        ));
    }

    Ok(IngredientKey(key))
}

/// Normalize every entry, failing on the first invalid one.
pub fn normalize_all<S: AsRef<str>>(raws: &[S]) -> Result<Vec<IngredientKey>, FoodError> {
    raws.iter().map(|raw| normalize(raw.as_ref())).collect()
}
