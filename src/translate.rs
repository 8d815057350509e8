//! Translation of missing-ingredient names.
//!
//! Defines the [`Translator`] trait and its implementations:
//! - **[`MyMemoryTranslator`]** — calls the public MyMemory `GET /get` endpoint.
//! - **[`IdentityTranslator`]** — echoes the input; used when translation is
//!   disabled in the configuration.
//!
//! Translation never fails a search. [`translate_names`] turns every failure
//! into the untranslated fallback plus a warning string that ends up on the
//! [`SearchResult`](crate::models::SearchResult).

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TranslationConfig;
use crate::error::FoodError;
use crate::models::BilingualName;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source_lang` to `target_lang` (ISO 639-1 codes).
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, FoodError>;
}

/// Returns the input unchanged.
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String, FoodError> {
        Ok(text.to_string())
    }
}

/// Translator backed by the MyMemory HTTP API.
pub struct MyMemoryTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl MyMemoryTranslator {
    pub fn new(config: &TranslationConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Translator for MyMemoryTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, FoodError> {
        let langpair = format!("{}|{}", source_lang, target_lang);
        let response = self
            .client
            .get(format!("{}/get", self.base_url))
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await
            .map_err(|e| FoodError::translation(text, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FoodError::translation(text, format!("HTTP {}", status)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FoodError::translation(text, e.to_string()))?;
        parse_mymemory_response(text, &json)
    }
}

/// Extract `responseData.translatedText` from a MyMemory response.
fn parse_mymemory_response(text: &str, json: &serde_json::Value) -> Result<String, FoodError> {
    // MyMemory reports quota and argument errors with HTTP 200 and a
    // non-200 responseStatus.
    let status = json.get("responseStatus").and_then(|s| {
        s.as_u64()
            .or_else(|| s.as_str().and_then(|v| v.parse().ok()))
    });
    if let Some(code) = status {
        if code != 200 {
            let details = json
                .get("responseDetails")
                .and_then(|d| d.as_str())
                .unwrap_or("unknown error");
            return Err(FoodError::translation(
                text,
                format!("status {}: {}", code, details),
            ));
        }
    }

    json.get("responseData")
        .and_then(|d| d.get("translatedText"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| FoodError::translation(text, "missing translatedText"))
}

/// Create the configured translator.
pub fn create_translator(config: &TranslationConfig) -> anyhow::Result<Arc<dyn Translator>> {
    match config.kind.as_str() {
        "disabled" => Ok(Arc::new(IdentityTranslator)),
        "mymemory" => Ok(Arc::new(MyMemoryTranslator::new(config)?)),
        other => anyhow::bail!("Unknown translation kind: {}", other),
    }
}

/// Source and target language codes for bilingual display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl From<&TranslationConfig> for LanguagePair {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            source: config.source_lang.clone(),
            target: config.target_lang.clone(),
        }
    }
}

/// Translate each distinct name once.
///
/// Returns the bilingual pair per name and one warning per failed name.
pub async fn translate_names(
    translator: &dyn Translator,
    languages: &LanguagePair,
    names: &BTreeSet<String>,
) -> (BTreeMap<String, BilingualName>, Vec<String>) {
    let mut pairs = BTreeMap::new();
    let mut warnings = Vec::new();

    for name in names {
        let pair = match translator
            .translate(name, &languages.source, &languages.target)
            .await
        {
            Ok(target) => BilingualName {
                source: name.clone(),
                target,
            },
            Err(e) => {
                tracing::warn!(ingredient = %name, error = %e, "translation failed, showing original name");
                warnings.push(e.to_string());
                BilingualName::untranslated(name)
            }
        };
        pairs.insert(name.clone(), pair);
    }

    (pairs, warnings)
}
