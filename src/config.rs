use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_exclusions")]
    pub default_exclusions: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_exclusions: default_exclusions(),
            max_results: default_max_results(),
        }
    }
}

fn default_exclusions() -> Vec<String> {
    vec!["plums".to_string()]
}
fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: String,
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    #[serde(default)]
    pub ignore_pantry: bool,
    #[serde(default = "default_image_size")]
    pub image_size: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: default_provider_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            candidate_limit: default_candidate_limit(),
            ignore_pantry: false,
            image_size: default_image_size(),
        }
    }
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.kind != "disabled"
    }
}

fn default_provider_kind() -> String {
    "spoonacular".to_string()
}
fn default_provider_url() -> String {
    "https://api.spoonacular.com".to_string()
}
fn default_api_key_env() -> String {
    "SPOONACULAR_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_candidate_limit() -> usize {
    10
}
fn default_image_size() -> String {
    "636x393".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_kind")]
    pub kind: String,
    #[serde(default = "default_translation_url")]
    pub base_url: String,
    #[serde(default = "default_source_lang")]
    pub source_lang: String,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default = "default_translation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            kind: default_translation_kind(),
            base_url: default_translation_url(),
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            timeout_secs: default_translation_timeout_secs(),
        }
    }
}

fn default_translation_kind() -> String {
    "mymemory".to_string()
}
fn default_translation_url() -> String {
    "https://api.mymemory.translated.net".to_string()
}
fn default_source_lang() -> String {
    "en".to_string()
}
fn default_target_lang() -> String {
    "pl".to_string()
}
fn default_translation_timeout_secs() -> u64 {
    15
}

impl Config {
    /// Offline configuration: no provider, no translation, local paths.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/pantry.sqlite"),
            },
            output: OutputConfig::default(),
            query: QueryConfig::default(),
            provider: ProviderConfig {
                kind: "disabled".to_string(),
                ..ProviderConfig::default()
            },
            translation: TranslationConfig {
                kind: "disabled".to_string(),
                ..TranslationConfig::default()
            },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Upper bound on meals per result page.
pub const MAX_RESULTS_CAP: usize = 5;

fn validate(config: &Config) -> Result<()> {
    if !(1..=MAX_RESULTS_CAP).contains(&config.query.max_results) {
        anyhow::bail!("query.max_results must be in [1, {}]", MAX_RESULTS_CAP);
    }

    match config.provider.kind.as_str() {
        "disabled" | "spoonacular" => {}
        other => anyhow::bail!(
            "Unknown provider kind: '{}'. Must be disabled or spoonacular.",
            other
        ),
    }
    if !(1..=100).contains(&config.provider.candidate_limit) {
        anyhow::bail!("provider.candidate_limit must be in [1, 100]");
    }
    if config.provider.timeout_secs == 0 {
        anyhow::bail!("provider.timeout_secs must be > 0");
    }

    match config.translation.kind.as_str() {
        "disabled" | "mymemory" => {}
        other => anyhow::bail!(
            "Unknown translation kind: '{}'. Must be disabled or mymemory.",
            other
        ),
    }
    if config.translation.timeout_secs == 0 {
        anyhow::bail!("translation.timeout_secs must be > 0");
    }
    if config.translation.source_lang == config.translation.target_lang {
        anyhow::bail!("translation.source_lang and translation.target_lang must differ");
    }

    Ok(())
}
