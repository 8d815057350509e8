use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use pantry_match::fingerprint::{build_signature, ExclusionPolicy};
use pantry_match::models::{
    BilingualName, IngredientStatus, MealCandidate, Nutrient, Nutrition, SearchResult,
    TaggedIngredient,
};
use pantry_match::store::{MealStore, SqliteStore};

fn pantry_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pantry");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Provider and translation disabled: nothing here may reach the network.
    let config_content = format!(
        r#"[db]
path = "{root}/data/pantry.sqlite"

[output]
dir = "{root}/output"

[query]
default_exclusions = ["plums"]
max_results = 5

[provider]
kind = "disabled"

[translation]
kind = "disabled"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("pantry.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pantry(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pantry_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pantry binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn cached_meal() -> MealCandidate {
    MealCandidate {
        id: 654959,
        title: "Pasta With Tuna".to_string(),
        image: "https://img.spoonacular.com/recipes/654959-636x393.jpg".to_string(),
        source_url: Some("https://example.com/pasta-with-tuna".to_string()),
        summary: Some("A <b>fast</b> weeknight dish.".to_string()),
        ingredients: vec![
            TaggedIngredient {
                key: None,
                name: "eggs".to_string(),
                status: IngredientStatus::Present,
                translation: None,
            },
            TaggedIngredient {
                key: None,
                name: "tuna".to_string(),
                status: IngredientStatus::Missing,
                translation: Some(BilingualName {
                    source: "tuna".to_string(),
                    target: "tuńczyk".to_string(),
                }),
            },
        ],
        nutrition: Nutrition {
            calories: Some(Nutrient::new(423.0, "kcal")),
            carbs: Some(Nutrient::new(48.5, "g")),
            protein: Some(Nutrient::new(24.1, "g")),
        },
        missing_count: 1,
    }
}

/// Write a record straight into the database the binary will read.
fn seed_cache(tmp: &TempDir, includes: &[&str], excludes: &[&str]) {
    let db_path = tmp.path().join("data").join("pantry.sqlite");
    let policy = ExclusionPolicy::merge_defaults(&["plums"]).unwrap();
    let sig = build_signature(includes, excludes, &policy).unwrap();
    let result = SearchResult {
        meals: vec![cached_meal()],
        min_carb_pick: Some(0),
        max_protein_pick: Some(0),
        warnings: Vec::new(),
    };

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let store = SqliteStore::open(&db_path).await.unwrap();
        store.save(&sig, &result).await.unwrap();
        store.close().await;
    });
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pantry(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("pantry.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pantry(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pantry(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_find_uncached_with_disabled_provider_fails_without_artifact() {
    let (tmp, config_path) = setup_test_env();
    run_pantry(&config_path, &["init"]);

    let (_, stderr, success) = run_pantry(&config_path, &["find", "eggs", "pasta"]);
    assert!(!success, "find should fail when nothing is cached and no provider is configured");
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
    assert!(!tmp.path().join("output").join("eggs_pasta.html").exists());
}

#[test]
fn test_find_invalid_ingredient_fails() {
    let (tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pantry(&config_path, &["find", "%%%"]);
    assert!(!success);
    assert!(stderr.contains("invalid ingredient"), "stderr: {}", stderr);
    assert!(!tmp.path().join("output").exists());
}

#[test]
fn test_find_serves_cached_query_offline() {
    let (tmp, config_path) = setup_test_env();
    seed_cache(&tmp, &["pasta", "eggs"], &[]);

    // Order and case do not matter for the signature.
    let (stdout, stderr, success) = run_pantry(&config_path, &["find", "Eggs", "PASTA"]);
    assert!(success, "find failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("(cache)"));
    assert!(stdout.contains("Pasta With Tuna"));

    let artifact = tmp.path().join("output").join("eggs_pasta.html");
    let html = fs::read_to_string(&artifact).unwrap();
    assert!(html.contains("tuna — tuńczyk"));
    assert!(html.contains("48.5 g"));
}

#[test]
fn test_repeat_find_writes_identical_artifact() {
    let (tmp, config_path) = setup_test_env();
    seed_cache(&tmp, &["eggs", "pasta"], &[]);
    let artifact = tmp.path().join("output").join("eggs_pasta.html");

    let (_, _, success) = run_pantry(&config_path, &["find", "eggs", "pasta"]);
    assert!(success);
    let first = fs::read(&artifact).unwrap();

    let (_, _, success) = run_pantry(&config_path, &["find", "pasta", "eggs"]);
    assert!(success);
    assert_eq!(first, fs::read(&artifact).unwrap());
}

#[test]
fn test_exclusions_are_part_of_the_query() {
    let (tmp, config_path) = setup_test_env();
    seed_cache(&tmp, &["eggs", "pasta"], &["milk"]);

    let (_, _, without_exclude) = run_pantry(&config_path, &["find", "eggs", "pasta"]);
    assert!(!without_exclude);

    let (_, _, with_exclude) = run_pantry(&config_path, &["find", "eggs", "pasta", "-x", "milk"]);
    assert!(with_exclude);
}

#[test]
fn test_cached_list_show_forget() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_pantry(&config_path, &["cached", "list"]);
    assert!(success);
    assert!(stdout.contains("No cached queries"));

    seed_cache(&tmp, &["eggs", "pasta"], &[]);

    let (stdout, _, success) = run_pantry(&config_path, &["cached", "list"]);
    assert!(success);
    assert!(stdout.contains("eggs_pasta"));
    assert!(stdout.contains("plums"));

    let (stdout, stderr, success) =
        run_pantry(&config_path, &["cached", "show", "eggs", "pasta", "--json"]);
    assert!(success, "show failed: {}", stderr);
    let record: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(record["result"]["meals"][0]["id"], 654959);
    assert_eq!(record["result"]["min_carb_pick"], 0);

    let (stdout, _, success) = run_pantry(&config_path, &["cached", "forget", "eggs", "pasta"]);
    assert!(success);
    assert!(stdout.contains("Forgot"));

    let (_, _, success) = run_pantry(&config_path, &["cached", "show", "eggs", "pasta"]);
    assert!(!success);
}
