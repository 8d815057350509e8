//! Recipe provider gateway.
//!
//! Defines the [`ProviderGateway`] trait and concrete implementations:
//! - **[`SpoonacularGateway`]** — calls Spoonacular's `complexSearch` endpoint
//!   with nutrition attached.
//! - **[`DisabledGateway`]** — refuses every lookup; lets cached queries
//!   resolve offline.
//!
//! Responses are validated at this boundary: every record either becomes a
//! [`RawMealData`] or is rejected with [`FoodError::MalformedRecord`]. Nothing
//! loosely typed reaches the ranking engine.
//!
//! # Error mapping
//!
//! - Network errors, timeouts, HTTP 5xx → [`FoodError::ProviderUnavailable`]
//! - HTTP 429, HTTP 402 (Spoonacular daily points exhausted) → [`FoodError::ProviderQuota`]
//! - Any other HTTP 4xx → [`FoodError::ProviderRejected`]
//!
//! Retries happen in the orchestrator, not here.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::FoodError;
use crate::models::{Nutrient, Nutrition, RawIngredient, RawMealData};
use crate::normalize::IngredientKey;

#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Short name for logs (e.g. `"spoonacular"`).
    fn name(&self) -> &str;

    /// Fetch up to `limit` meals using `includes` and avoiding `excludes`.
    async fn search(
        &self,
        includes: &BTreeSet<IngredientKey>,
        excludes: &BTreeSet<IngredientKey>,
        limit: usize,
    ) -> Result<Vec<RawMealData>, FoodError>;
}

// ============ Disabled Gateway ============

pub struct DisabledGateway;

#[async_trait]
impl ProviderGateway for DisabledGateway {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(
        &self,
        includes: &BTreeSet<IngredientKey>,
        _excludes: &BTreeSet<IngredientKey>,
        _limit: usize,
    ) -> Result<Vec<RawMealData>, FoodError> {
        Err(FoodError::ProviderDisabled {
            query: join_terms(includes),
        })
    }
}

// ============ Spoonacular Gateway ============

/// Gateway for `GET /recipes/complexSearch`.
///
/// The API key is read from the environment variable named by
/// `provider.api_key_env` when the gateway is built. A missing key only
/// fails the first uncached search, so cached queries still work without it.
pub struct SpoonacularGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    ignore_pantry: bool,
    image_size: String,
}

impl SpoonacularGateway {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&config.api_key_env).ok(),
            api_key_env: config.api_key_env.clone(),
            ignore_pantry: config.ignore_pantry,
            image_size: config.image_size.clone(),
        })
    }
}

/// Turn a key back into the provider's query vocabulary (`spring-onion` → `spring onion`).
fn query_term(key: &IngredientKey) -> String {
    key.as_str().replace('-', " ")
}

fn join_terms(keys: &BTreeSet<IngredientKey>) -> String {
    keys.iter().map(query_term).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl ProviderGateway for SpoonacularGateway {
    fn name(&self) -> &str {
        "spoonacular"
    }

    async fn search(
        &self,
        includes: &BTreeSet<IngredientKey>,
        excludes: &BTreeSet<IngredientKey>,
        limit: usize,
    ) -> Result<Vec<RawMealData>, FoodError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| FoodError::ProviderRejected {
            status: 401,
            message: format!("{} environment variable not set", self.api_key_env),
        })?;

        let params = [
            ("apiKey", api_key.to_string()),
            ("includeIngredients", join_terms(includes)),
            ("excludeIngredients", join_terms(excludes)),
            ("addRecipeNutrition", "true".to_string()),
            ("ignorePantry", self.ignore_pantry.to_string()),
            ("number", limit.to_string()),
        ];

        let response = self
            .client
            .get(format!("{}/recipes/complexSearch", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| FoodError::provider_unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body_text));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| FoodError::provider_unavailable(format!("unreadable response: {}", e)))?;

        parse_search_response(&json, &self.image_size)
    }
}

/// Map a non-success HTTP status to the error taxonomy.
fn classify_status(status: u16, body: String) -> FoodError {
    match status {
        402 | 429 => FoodError::provider_quota(format!("HTTP {}: {}", status, body)),
        500..=599 => FoodError::provider_unavailable(format!("HTTP {}: {}", status, body)),
        _ => FoodError::ProviderRejected {
            status,
            message: body,
        },
    }
}

/// Validate a `complexSearch` response into meal records.
///
/// A response without a `results` array is rejected outright. Individual
/// malformed records are skipped with a warning.
pub fn parse_search_response(json: &Value, image_size: &str) -> Result<Vec<RawMealData>, FoodError> {
    let results = json
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| FoodError::malformed("response has no results array"))?;

    let mut meals = Vec::with_capacity(results.len());
    for record in results {
        match parse_meal(record, image_size) {
            Ok(meal) => meals.push(meal),
            Err(e) => tracing::warn!(error = %e, "skipping provider record"),
        }
    }
    Ok(meals)
}

/// Validate a single recipe record.
pub fn parse_meal(record: &Value, image_size: &str) -> Result<RawMealData, FoodError> {
    let id = record
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| FoodError::malformed("record without numeric id"))?;

    let title = record
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FoodError::malformed(format!("record {} has no title", id)))?
        .to_string();

    let image = match record.get("image").and_then(Value::as_str) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => record
            .get("imageType")
            .and_then(Value::as_str)
            .map(|ext| {
                format!(
                    "https://img.spoonacular.com/recipes/{}-{}.{}",
                    id, image_size, ext
                )
            })
            .unwrap_or_default(),
    };

    let nutrition = record.get("nutrition");
    let ingredients = match nutrition
        .and_then(|n| n.get("ingredients"))
        .and_then(Value::as_array)
    {
        Some(list) => list
            .iter()
            .map(|item| parse_ingredient(id, item))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(RawMealData {
        id,
        title,
        image,
        source_url: optional_string(record, "sourceUrl"),
        summary: optional_string(record, "summary"),
        ingredients,
        nutrition: parse_nutrition(nutrition)?,
    })
}

fn optional_string(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_ingredient(meal_id: u64, item: &Value) -> Result<RawIngredient, FoodError> {
    let name = item
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            FoodError::malformed(format!("record {} has an ingredient without a name", meal_id))
        })?;

    Ok(RawIngredient {
        name: name.to_string(),
        amount: item.get("amount").and_then(Value::as_f64),
        unit: optional_string(item, "unit"),
    })
}

fn parse_nutrition(nutrition: Option<&Value>) -> Result<Nutrition, FoodError> {
    let nutrients = match nutrition
        .and_then(|n| n.get("nutrients"))
        .and_then(Value::as_array)
    {
        Some(list) => list,
        None => return Ok(Nutrition::default()),
    };

    let find = |wanted: &str| -> Result<Option<Nutrient>, FoodError> {
        let entry = nutrients.iter().find(|n| {
            n.get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case(wanted))
        });
        match entry {
            None => Ok(None),
            Some(entry) => {
                let amount = entry
                    .get("amount")
                    .and_then(Value::as_f64)
                    .filter(|a| a.is_finite())
                    .ok_or_else(|| {
                        FoodError::malformed(format!("nutrient {} has no numeric amount", wanted))
                    })?;
                let unit = optional_string(entry, "unit").unwrap_or_default();
                Ok(Some(Nutrient { amount, unit }))
            }
        }
    };

    Ok(Nutrition {
        calories: find("Calories")?,
        carbs: find("Carbohydrates")?,
        protein: find("Protein")?,
    })
}

/// Create the configured gateway.
pub fn create_gateway(config: &ProviderConfig) -> anyhow::Result<Arc<dyn ProviderGateway>> {
    if !config.is_enabled() {
        return Ok(Arc::new(DisabledGateway));
    }
    match config.kind.as_str() {
        "spoonacular" => Ok(Arc::new(SpoonacularGateway::new(config)?)),
        other => anyhow::bail!("Unknown provider kind: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "id": 715415,
            "title": "Red Lentil Soup",
            "image": "https://img.spoonacular.com/recipes/715415-312x231.jpg",
            "imageType": "jpg",
            "sourceUrl": "https://example.com/lentil-soup",
            "summary": "A hearty soup.",
            "nutrition": {
                "nutrients": [
                    { "name": "Calories", "amount": 477.14, "unit": "kcal" },
                    { "name": "Protein", "amount": 27.16, "unit": "g" },
                    { "name": "Carbohydrates", "amount": 52.71, "unit": "g" }
                ],
                "ingredients": [
                    { "name": "carrots", "amount": 2.0, "unit": "" },
                    { "name": "red lentils", "amount": 1.5, "unit": "cups" }
                ]
            }
        })
    }

    #[test]
    fn test_parse_full_record() {
        let meal = parse_meal(&sample_record(), "636x393").unwrap();
        assert_eq!(meal.id, 715415);
        assert_eq!(meal.title, "Red Lentil Soup");
        assert_eq!(meal.ingredients.len(), 2);
        assert_eq!(meal.ingredients[1].unit.as_deref(), Some("cups"));
        assert_eq!(meal.ingredients[0].unit, None);
        assert_eq!(meal.nutrition.carbs, Some(Nutrient::new(52.71, "g")));
        assert_eq!(meal.nutrition.calories.unwrap().amount, 477.14);
        assert_eq!(meal.source_url.as_deref(), Some("https://example.com/lentil-soup"));
    }

    #[test]
    fn test_image_built_from_type_when_url_absent() {
        let mut record = sample_record();
        record.as_object_mut().unwrap().remove("image");
        let meal = parse_meal(&record, "636x393").unwrap();
        assert_eq!(
            meal.image,
            "https://img.spoonacular.com/recipes/715415-636x393.jpg"
        );
    }

    #[test]
    fn test_missing_nutrition_is_empty() {
        let meal = parse_meal(&json!({ "id": 1, "title": "Toast" }), "636x393").unwrap();
        assert!(meal.ingredients.is_empty());
        assert_eq!(meal.nutrition, Nutrition::default());
    }

    #[test]
    fn test_rejects_record_without_id() {
        let err = parse_meal(&json!({ "title": "Mystery" }), "636x393").unwrap_err();
        assert!(matches!(err, FoodError::MalformedRecord { .. }));
    }

    #[test]
    fn test_rejects_non_numeric_nutrient() {
        let record = json!({
            "id": 2,
            "title": "Odd",
            "nutrition": { "nutrients": [{ "name": "Protein", "amount": "lots", "unit": "g" }] }
        });
        assert!(parse_meal(&record, "636x393").is_err());
    }

    #[test]
    fn test_response_skips_bad_records() {
        let body = json!({ "results": [sample_record(), { "title": "no id" }] });
        let meals = parse_search_response(&body, "636x393").unwrap();
        assert_eq!(meals.len(), 1);
    }

    #[test]
    fn test_response_without_results_rejected() {
        assert!(parse_search_response(&json!({ "status": "failure" }), "636x393").is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(429, String::new()),
            FoodError::ProviderQuota { .. }
        ));
        assert!(matches!(
            classify_status(402, String::new()),
            FoodError::ProviderQuota { .. }
        ));
        assert!(matches!(
            classify_status(503, String::new()),
            FoodError::ProviderUnavailable { .. }
        ));
        assert!(matches!(
            classify_status(401, String::new()),
            FoodError::ProviderRejected { status: 401, .. }
        ));
    }

    #[test]
    fn test_query_terms_restore_spaces() {
        let keys: BTreeSet<IngredientKey> = crate::normalize::normalize_all(&["spring onion", "eggs"])
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(join_terms(&keys), "eggs,spring onion");
    }

    #[tokio::test]
    async fn test_disabled_gateway_refuses_without_retry() {
        let err = DisabledGateway
            .search(&BTreeSet::new(), &BTreeSet::new(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FoodError::ProviderDisabled { .. }));
        assert!(!err.is_retryable());
    }

    mod http {
        use super::*;
        use crate::fingerprint::{build_signature, ExclusionPolicy};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        fn local_config(addr: std::net::SocketAddr, key_env: &str) -> ProviderConfig {
            ProviderConfig {
                base_url: format!("http://{}", addr),
                api_key_env: key_env.to_string(),
                timeout_secs: 1,
                ..ProviderConfig::default()
            }
        }

        async fn read_request_head(stream: &mut TcpStream) -> String {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            String::from_utf8_lossy(&buf).to_string()
        }

        #[tokio::test]
        async fn test_request_carries_query_and_parses_reply() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                let head = read_request_head(&mut stream).await;
                let body = json!({ "results": [sample_record()] }).to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
                head
            });

            std::env::set_var("PANTRY_TEST_KEY_REQUEST", "test-key");
            let gateway =
                SpoonacularGateway::new(&local_config(addr, "PANTRY_TEST_KEY_REQUEST")).unwrap();
            let policy = ExclusionPolicy::merge_defaults(&["plums"]).unwrap();
            let sig = build_signature(&["Cherry Tomatoes", "eggs"], &["milk"], &policy).unwrap();

            let meals = gateway
                .search(sig.includes(), sig.excludes(), 10)
                .await
                .unwrap();
            assert_eq!(meals.len(), 1);
            assert_eq!(meals[0].id, 715415);

            let head = server.await.unwrap();
            let request_line = head.lines().next().unwrap();
            assert!(request_line.starts_with("GET /recipes/complexSearch?"), "{}", request_line);
            assert!(request_line.contains("apiKey=test-key"));
            assert!(request_line.contains("includeIngredients=cherry+tomatoes%2Ceggs"));
            assert!(request_line.contains("excludeIngredients=milk%2Cplums"));
            assert!(request_line.contains("addRecipeNutrition=true"));
            assert!(request_line.contains("number=10"));
        }

        #[tokio::test]
        async fn test_silent_provider_times_out_as_unavailable() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = tokio::spawn(async move {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(stream);
            });

            std::env::set_var("PANTRY_TEST_KEY_TIMEOUT", "test-key");
            let gateway =
                SpoonacularGateway::new(&local_config(addr, "PANTRY_TEST_KEY_TIMEOUT")).unwrap();
            let includes = crate::normalize::normalize_all(&["eggs"])
                .unwrap()
                .into_iter()
                .collect();

            let err = gateway
                .search(&includes, &BTreeSet::new(), 10)
                .await
                .unwrap_err();
            assert!(matches!(err, FoodError::ProviderUnavailable { .. }), "got {:?}", err);
            assert!(err.is_retryable());
            server.abort();
        }

        #[tokio::test]
        async fn test_missing_api_key_is_rejected_without_network() {
            let addr: std::net::SocketAddr = "127.0.0.1:9".parse().unwrap();
            let gateway =
                SpoonacularGateway::new(&local_config(addr, "PANTRY_TEST_KEY_NEVER_SET")).unwrap();
            let includes = crate::normalize::normalize_all(&["eggs"])
                .unwrap()
                .into_iter()
                .collect();

            let err = gateway
                .search(&includes, &BTreeSet::new(), 10)
                .await
                .unwrap_err();
            assert!(matches!(err, FoodError::ProviderRejected { status: 401, .. }));
            assert!(err.to_string().contains("PANTRY_TEST_KEY_NEVER_SET"));
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_factory_honors_disabled_kind() {
        let config = ProviderConfig {
            kind: "disabled".to_string(),
            ..ProviderConfig::default()
        };
        assert!(!config.is_enabled());
        assert_eq!(create_gateway(&config).unwrap().name(), "disabled");

        let config = ProviderConfig {
            kind: "mystery".to_string(),
            ..ProviderConfig::default()
        };
        assert!(create_gateway(&config).is_err());
    }
}
