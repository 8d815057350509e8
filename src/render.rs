//! HTML artifact rendering.
//!
//! [`render_html`] turns a [`SearchResult`] into a standalone page: one
//! `<article>` per meal, a recommendation section naming the min-carb and
//! max-protein picks, and a caveat block when the result carries warnings.
//! Output depends only on its inputs, so repeat renders are byte-identical.

use anyhow::{Context, Result};
use html_escape::{decode_html_entities, encode_double_quoted_attribute as attr, encode_text as text};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::fingerprint::QuerySignature;
use crate::models::{MealCandidate, Nutrient, SearchResult};
use crate::normalize::IngredientKey;

const STYLE: &str = "body{font-family:sans-serif;max-width:60rem;margin:2rem auto;padding:0 1rem}\
article{border:1px solid #ddd;border-radius:6px;padding:1rem;margin:1rem 0}\
article img{max-width:100%}\
.caveat{background:#fff4e5;border-left:4px solid #f0a020;padding:.5rem 1rem}\
.recommendation{background:#eef7ee;padding:.5rem 1rem}";

/// Render the result page for `sig`.
pub fn render_html(sig: &QuerySignature, result: &SearchResult) -> String {
    let mut out = String::new();
    let title = format!("Meals with {}", join_keys(sig.includes()));

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", text(&title));
    let _ = writeln!(out, "<style>{}</style>", STYLE);
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(out, "<h1>{}</h1>", text(&title));

    if !sig.excludes().is_empty() {
        let _ = writeln!(
            out,
            "<p class=\"excluded\">Excluding: {}</p>",
            text(&join_keys(sig.excludes()))
        );
    }

    if !result.warnings.is_empty() {
        out.push_str("<section class=\"caveat\">\n<p>Some ingredient names could not be translated and are shown untranslated:</p>\n<ul>\n");
        for warning in &result.warnings {
            let _ = writeln!(out, "<li>{}</li>", text(warning));
        }
        out.push_str("</ul>\n</section>\n");
    }

    if result.is_empty() {
        out.push_str("<p class=\"empty\">No meals found for these ingredients.</p>\n");
    } else {
        render_recommendations(&mut out, result);
        for meal in &result.meals {
            render_meal(&mut out, meal);
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn render_recommendations(out: &mut String, result: &SearchResult) {
    out.push_str("<section class=\"recommendation\">\n<h2>Recommended</h2>\n<ul>\n");
    match result.min_carb() {
        Some(meal) => {
            let _ = writeln!(
                out,
                "<li>Lowest carbohydrates: {} ({})</li>",
                meal_link(meal),
                text(&format_nutrient(meal.nutrition.carbs.as_ref()))
            );
        }
        None => out.push_str("<li>Lowest carbohydrates: no carbohydrate data</li>\n"),
    }
    match result.max_protein() {
        Some(meal) => {
            let _ = writeln!(
                out,
                "<li>Highest protein: {} ({})</li>",
                meal_link(meal),
                text(&format_nutrient(meal.nutrition.protein.as_ref()))
            );
        }
        None => out.push_str("<li>Highest protein: no protein data</li>\n"),
    }
    out.push_str("</ul>\n</section>\n");
}

fn render_meal(out: &mut String, meal: &MealCandidate) {
    let _ = writeln!(out, "<article id=\"meal-{}\">", meal.id);
    let _ = writeln!(out, "<h2>{}</h2>", meal_link(meal));
    let _ = writeln!(
        out,
        "<img src=\"{}\" alt=\"{}\">",
        attr(&meal.image),
        attr(&meal.title)
    );
    if let Some(summary) = &meal.summary {
        // Summaries arrive as HTML; reduce to plain text before escaping once.
        let plain = decode_html_entities(&strip_tags(summary)).into_owned();
        let _ = writeln!(out, "<p class=\"summary\">{}</p>", text(&plain));
    }

    let n = &meal.nutrition;
    out.push_str("<table class=\"nutrition\">\n");
    let _ = writeln!(out, "<tr><th>Carbohydrates</th><td>{}</td></tr>", text(&format_nutrient(n.carbs.as_ref())));
    let _ = writeln!(out, "<tr><th>Protein</th><td>{}</td></tr>", text(&format_nutrient(n.protein.as_ref())));
    let _ = writeln!(out, "<tr><th>Calories</th><td>{}</td></tr>", text(&format_nutrient(n.calories.as_ref())));
    out.push_str("</table>\n");

    out.push_str("<h3>You have</h3>\n<ul class=\"present\">\n");
    for ing in meal.present() {
        let _ = writeln!(out, "<li>{}</li>", text(&ing.name));
    }
    out.push_str("</ul>\n");

    let _ = writeln!(out, "<h3>Missing ({})</h3>", meal.missing_count);
    out.push_str("<ul class=\"missing\">\n");
    for ing in meal.missing() {
        match &ing.translation {
            Some(pair) => {
                let _ = writeln!(
                    out,
                    "<li>{} — {}</li>",
                    text(&pair.source),
                    text(&pair.target)
                );
            }
            None => {
                let _ = writeln!(out, "<li>{}</li>", text(&ing.name));
            }
        }
    }
    out.push_str("</ul>\n</article>\n");
}

/// Keys may themselves contain `_`, so join the set rather than split an id.
fn join_keys(keys: &BTreeSet<IngredientKey>) -> String {
    keys.iter().map(IngredientKey::as_str).collect::<Vec<_>>().join(", ")
}

fn meal_link(meal: &MealCandidate) -> String {
    match &meal.source_url {
        Some(url) => format!("<a href=\"{}\">{}</a>", attr(url), text(&meal.title)),
        None => text(&meal.title).into_owned(),
    }
}

fn format_nutrient(nutrient: Option<&Nutrient>) -> String {
    match nutrient {
        Some(n) if n.unit.is_empty() => format!("{}", n.amount),
        Some(n) => format!("{} {}", n.amount, n.unit),
        None => "n/a".to_string(),
    }
}

/// Drop markup from provider summaries, which arrive as HTML fragments.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Path of the artifact for `sig` under `dir`.
pub fn artifact_path(dir: &Path, sig: &QuerySignature) -> PathBuf {
    dir.join(format!("{}.html", sig.file_stem()))
}

/// Write `html` to `{dir}/{stem}.html` through a uniquely named temp file in
/// the same directory, then rename it into place. A failed write never leaves
/// a partial artifact, and concurrent writers never share a temp file.
pub fn write_artifact(dir: &Path, sig: &QuerySignature, html: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = artifact_path(dir, sig);
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{}.", sig.file_stem()))
        .suffix(".html.tmp")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(html.as_bytes())
        .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    tmp.persist(&path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move artifact into {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{build_signature, ExclusionPolicy};
    use crate::models::{BilingualName, IngredientStatus, Nutrition, TaggedIngredient};
    use crate::normalize::normalize;
    use tempfile::TempDir;

    fn sig() -> QuerySignature {
        let policy = ExclusionPolicy::merge_defaults(&["plums"]).unwrap();
        build_signature(&["tomatoes", "eggs", "pasta"], &[], &policy).unwrap()
    }

    fn meal(id: u64, title: &str) -> MealCandidate {
        MealCandidate {
            id,
            title: title.to_string(),
            image: format!("https://img.example/{}-636x393.jpg", id),
            source_url: Some(format!("https://example.com/{}?a=1&b=2", id)),
            summary: Some("A <b>quick</b> dinner.".to_string()),
            ingredients: vec![
                TaggedIngredient {
                    key: Some(normalize("eggs").unwrap()),
                    name: "eggs".to_string(),
                    status: IngredientStatus::Present,
                    translation: None,
                },
                TaggedIngredient {
                    key: Some(normalize("basil").unwrap()),
                    name: "basil".to_string(),
                    status: IngredientStatus::Missing,
                    translation: Some(BilingualName {
                        source: "basil".to_string(),
                        target: "bazylia".to_string(),
                    }),
                },
            ],
            nutrition: Nutrition {
                calories: Some(Nutrient::new(477.14, "kcal")),
                carbs: Some(Nutrient::new(12.5, "g")),
                protein: None,
            },
            missing_count: 1,
        }
    }

    fn result() -> SearchResult {
        SearchResult {
            meals: vec![meal(1, "Pasta <Frittata>"), meal(2, "Shakshuka")],
            min_carb_pick: Some(0),
            max_protein_pick: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_page_has_one_article_per_meal() {
        let html = render_html(&sig(), &result());
        assert_eq!(html.matches("<article").count(), 2);
        assert!(html.contains("<li>basil — bazylia</li>"));
        assert!(html.contains("477.14 kcal"));
        assert!(html.contains("Lowest carbohydrates"));
        assert!(html.contains("Highest protein: no protein data"));
        assert!(!html.contains("class=\"caveat\""));
    }

    #[test]
    fn test_untrusted_text_is_escaped() {
        let html = render_html(&sig(), &result());
        assert!(html.contains("Pasta &lt;Frittata&gt;"));
        assert!(!html.contains("<Frittata>"));
        assert!(html.contains("?a=1&amp;b=2"));
        assert!(html.contains("A quick dinner."));
    }

    #[test]
    fn test_warnings_produce_caveat() {
        let mut r = result();
        r.warnings.push("translation of 'basil' failed: down".to_string());
        let html = render_html(&sig(), &r);
        assert!(html.contains("class=\"caveat\""));
        assert!(html.contains("<li>translation of 'basil' failed: down</li>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render_html(&sig(), &result()), render_html(&sig(), &result()));
    }

    #[test]
    fn test_empty_result_renders_notice() {
        let html = render_html(&sig(), &SearchResult::default());
        assert!(html.contains("No meals found"));
        assert!(!html.contains("<article"));
    }

    #[test]
    fn test_write_artifact_uses_file_stem() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("output");
        let path = write_artifact(&out, &sig(), "<html></html>").unwrap();

        assert_eq!(path, out.join("eggs_pasta_tomatoes.html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        let leftovers: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_summary_entities_are_not_escaped_twice() {
        let mut r = result();
        r.meals[0].summary = Some("Salt &amp; <b>pepper</b> &quot;classic&quot;".to_string());
        let html = render_html(&sig(), &r);
        assert!(html.contains("<p class=\"summary\">Salt &amp; pepper \"classic\"</p>"), "{}", html);
        assert!(!html.contains("&amp;amp;"));
    }

    #[test]
    fn test_heading_keeps_underscores_inside_keys() {
        let policy = ExclusionPolicy::merge_defaults(&["plums"]).unwrap();
        let sig = build_signature(&["half_and-half", "eggs"], &["sun_dried-tomatoes"], &policy).unwrap();
        let html = render_html(&sig, &SearchResult::default());
        assert!(html.contains("<h1>Meals with eggs, half_and-half</h1>"), "{}", html);
        assert!(html.contains("Excluding: plums, sun_dried-tomatoes"), "{}", html);
    }

    #[test]
    fn test_concurrent_writes_to_one_stem_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("output");
        let policy = ExclusionPolicy::merge_defaults(&["plums"]).unwrap();
        // Same includes, different excludes: one file stem, two queries.
        let a = build_signature(&["eggs", "pasta"], &["milk"], &policy).unwrap();
        let b = build_signature(&["eggs", "pasta"], &["cream"], &policy).unwrap();
        assert_eq!(a.file_stem(), b.file_stem());

        let pages_a = "<html>a</html>".repeat(2000);
        let pages_b = "<html>b</html>".repeat(2000);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| write_artifact(&out, &a, &pages_a).unwrap());
                scope.spawn(|| write_artifact(&out, &b, &pages_b).unwrap());
            }
        });

        let written = std::fs::read_to_string(out.join("eggs_pasta.html")).unwrap();
        assert!(written == pages_a || written == pages_b);
        let entries: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
