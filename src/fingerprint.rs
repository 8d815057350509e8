//! Query fingerprinting.
//!
//! A [`QuerySignature`] is the order-independent identity of a search: the
//! sorted, deduplicated include and exclude sets. It is the cache key in the
//! local store and the source of the artifact file name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::error::FoodError;
use crate::normalize::{normalize_all, IngredientKey};

/// Separator used when joining ingredient keys into identifiers.
pub const KEY_SEPARATOR: &str = "_";

/// How configured default exclusions combine with the caller's excludes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionPolicy {
    /// Merge these defaults into the caller's exclude set.
    Merge(BTreeSet<IngredientKey>),
    /// Use the caller's exclude set verbatim.
    Override,
}

impl ExclusionPolicy {
    /// Build a merge policy from raw configured names.
    pub fn merge_defaults<S: AsRef<str>>(defaults: &[S]) -> Result<Self, FoodError> {
        Ok(Self::Merge(normalize_all(defaults)?.into_iter().collect()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySignature {
    includes: BTreeSet<IngredientKey>,
    excludes: BTreeSet<IngredientKey>,
}

impl QuerySignature {
    pub fn includes(&self) -> &BTreeSet<IngredientKey> {
        &self.includes
    }

    pub fn excludes(&self) -> &BTreeSet<IngredientKey> {
        &self.excludes
    }

    pub fn includes_id(&self) -> String {
        join_keys(&self.includes)
    }

    pub fn excludes_id(&self) -> String {
        join_keys(&self.excludes)
    }

    /// Artifact file stem: sorted include keys joined by `_`.
    ///
    /// Excludes do not participate.
    pub fn file_stem(&self) -> String {
        self.includes_id()
    }

    /// Stable hex digest over both sets, used as the store's primary key.
    ///
    /// Keys cannot contain `|` or `;`, so the preimage is unambiguous.
    pub fn cache_key(&self) -> String {
        let mut hasher = Sha256::new();
        for key in &self.includes {
            hasher.update(key.as_str().as_bytes());
            hasher.update(b";");
        }
        hasher.update(b"|");
        for key in &self.excludes {
            hasher.update(key.as_str().as_bytes());
            hasher.update(b";");
        }
        format!("{:x}", hasher.finalize())
    }
}

fn join_keys(keys: &BTreeSet<IngredientKey>) -> String {
    keys.iter()
        .map(IngredientKey::as_str)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// Combine include and exclude keys into a canonical signature.
pub fn fingerprint<I, E>(includes: I, excludes: E, policy: &ExclusionPolicy) -> QuerySignature
where
    I: IntoIterator<Item = IngredientKey>,
    E: IntoIterator<Item = IngredientKey>,
{
    let includes: BTreeSet<IngredientKey> = includes.into_iter().collect();
    let mut excludes: BTreeSet<IngredientKey> = excludes.into_iter().collect();
    if let ExclusionPolicy::Merge(defaults) = policy {
        excludes.extend(defaults.iter().cloned());
    }
    QuerySignature { includes, excludes }
}

/// Normalize raw include/exclude text and fingerprint the result.
///
/// Fails before any I/O when an ingredient is invalid or nothing is included.
pub fn build_signature<S: AsRef<str>>(
    raw_includes: &[S],
    raw_excludes: &[S],
    policy: &ExclusionPolicy,
) -> Result<QuerySignature, FoodError> {
    let includes = normalize_all(raw_includes)?;
    if includes.is_empty() {
        return Err(FoodError::invalid_ingredient(
            "",
            "at least one ingredient must be included",
        ));
    }
    let excludes = normalize_all(raw_excludes)?;
    Ok(fingerprint(includes, excludes, policy))
}
