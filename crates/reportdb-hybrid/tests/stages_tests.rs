use std::collections::HashSet;

use reportdb_core::types::{ContentType, Fragment, TablePayload};
use reportdb_hybrid::compose::{compose_context, EMPTY_CONTEXT};
use reportdb_hybrid::expand::MAX_VARIANTS;
use reportdb_hybrid::rank::{base_score, dedup_key, fingerprint, score};
use reportdb_hybrid::retrieve::keywords;
use reportdb_hybrid::{analyze_query, deduplicate_and_rank, expand_query, BoostRule, QueryPattern};

fn fragment(content_type: ContentType, text: &str, page: i32, distance: Option<f32>) -> Fragment {
    Fragment { content_type, text: text.to_string(), page_number: page, document_id: 1, distance, table: TablePayload::Absent }
}

fn strings(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

#[test]
fn analyzer_flags_each_pattern() {
    let p = analyze_query("  What was the Performance TARGET in 2023?  ");
    assert_eq!(p.normalized, "what was the performance target in 2023?");
    assert!(p.table_query && p.numerical_query && p.temporal_query);
    assert!(!p.comparison_query && !p.specific_metric);
    assert!(p.is_complex);
    assert_eq!(p.matched(), vec![QueryPattern::TableQuery, QueryPattern::NumericalQuery, QueryPattern::TemporalQuery]);

    let p = analyze_query("compare customer satisfaction");
    assert_eq!(p.matched(), vec![QueryPattern::ComparisonQuery, QueryPattern::SpecificMetric]);

    let single = analyze_query("total");
    assert!(single.numerical_query);
    assert!(!single.is_complex, "one pattern is not complex");

    let none = analyze_query("hello there");
    assert!(none.matched().is_empty());
    assert!(!none.is_complex);
}

#[test]
fn expansion_keeps_original_first_and_caps() {
    let variants = expand_query("Customer service performance");
    assert_eq!(variants.len(), MAX_VARIANTS);
    assert_eq!(variants[0], "Customer service performance");
    assert_eq!(variants[1], "customer service result", "synonym table order, from the lower-cased query");

    assert_eq!(expand_query("hello"), vec!["hello".to_string()]);
    assert_eq!(
        expand_query("accuracy"),
        strings(&["accuracy", "correctness", "precision"])
    );
}

#[test]
fn expansion_replaces_inside_words() {
    let variants = expand_query("customers");
    assert!(variants.contains(&"taxpayers".to_string()));
}

#[test]
fn expansion_variants_are_distinct() {
    for query in ["performance target actual measure", "result actual", "aim target"] {
        let variants = expand_query(query);
        let distinct: HashSet<&String> = variants.iter().collect();
        assert_eq!(distinct.len(), variants.len(), "{:?}", variants);
        assert!(variants.len() <= MAX_VARIANTS);
        assert_eq!(variants[0], query);
    }
    assert_eq!(expand_query("result actual"), strings(&["result actual", "result result", "result achieved", "result real"]));
}

#[test]
fn keyword_tokens_longer_than_three() {
    assert_eq!(keywords("What is the Revenue for FY 2023"), strings(&["what", "revenue", "2023"]));
}

#[test]
fn base_scores() {
    assert_eq!(base_score(&fragment(ContentType::Text, "a", 1, Some(0.0))), 1.0);
    assert_eq!(base_score(&fragment(ContentType::Table, "a", 1, Some(1.0))), 0.5);
    assert_eq!(base_score(&fragment(ContentType::KeywordText, "a", 1, Some(0.5))), 0.7);
    assert!(base_score(&fragment(ContentType::Text, "a", 1, Some(f32::NAN))) >= 0.0);
}

#[test]
fn table_boost_outranks_equal_text() {
    let profile = analyze_query("performance target");
    let ranked = deduplicate_and_rank(
        vec![
            fragment(ContentType::Text, "narrative about goals", 1, Some(1.0)),
            fragment(ContentType::Table, "goals table", 2, Some(1.0)),
        ],
        &profile,
        10,
    );
    assert_eq!(ranked[0].fragment.content_type, ContentType::Table);
    assert!((ranked[0].final_score - 0.75).abs() < 1e-6);
    assert_eq!(ranked[0].applied_boost, Some(BoostRule::TableIntent));
    assert!((ranked[1].final_score - 0.5).abs() < 1e-6);
    assert_eq!(ranked[1].applied_boost, None);
}

#[test]
fn boosts_are_exclusive() {
    let profile = analyze_query("performance target for 2023");
    let table = score(fragment(ContentType::Table, "Uptime 99.9%", 1, Some(0.0)), &profile);
    assert_eq!(table.applied_boost, Some(BoostRule::TableIntent));
    assert_eq!(table.boost_factor, 1.5);

    let text = score(fragment(ContentType::Text, "grew 12 percent", 1, Some(0.0)), &profile);
    assert_eq!(text.applied_boost, Some(BoostRule::NumericIntent));
    assert_eq!(text.boost_factor, 1.3);

    let plain = score(fragment(ContentType::KeywordText, "no figures here", 1, None), &profile);
    assert_eq!(plain.boost_factor, 1.0);
    assert!((plain.final_score - 0.7).abs() < 1e-6);
}

#[test]
fn duplicates_collapse_on_prefix_and_page() {
    let prefix = "x".repeat(100);
    let a = fragment(ContentType::Text, &format!("{}first tail", prefix), 4, Some(2.0));
    let b = fragment(ContentType::KeywordText, &format!("{}second tail", prefix), 4, Some(0.5));
    let c = fragment(ContentType::Text, &format!("{}first tail", prefix), 5, Some(2.0));
    assert_eq!(fingerprint(&a), fingerprint(&b));
    assert_ne!(fingerprint(&a), fingerprint(&c));

    let ranked = deduplicate_and_rank(vec![a, b, c], &analyze_query("anything"), 10);
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].fragment.content_type, ContentType::Text, "first occurrence wins");
    assert!(ranked.iter().all(|r| r.fragment.content_type == ContentType::Text));
}

#[test]
fn dedup_key_is_exact_prefix_and_page() {
    let prefix = "é".repeat(99);
    let a = fragment(ContentType::Text, &format!("{}ab", prefix), 7, Some(1.0));
    let b = fragment(ContentType::Text, &format!("{}ac", prefix), 7, Some(1.0));
    let c = fragment(ContentType::Text, &format!("{}ba", prefix), 7, Some(1.0));
    assert_eq!(dedup_key(&a), (format!("{}a", prefix), 7), "prefix counts characters, not bytes");
    assert_eq!(dedup_key(&a), dedup_key(&b));
    assert_ne!(dedup_key(&a), dedup_key(&c));

    let many: Vec<Fragment> =
        (0..500).map(|i| fragment(ContentType::Text, &format!("distinct fragment {}", i), 1, Some(1.0))).collect();
    assert_eq!(deduplicate_and_rank(many, &analyze_query("anything"), 1000).len(), 500);
}

#[test]
fn ranking_is_stable_and_truncated() {
    let profile = analyze_query("plain question");
    let input: Vec<Fragment> = (0..6).map(|i| fragment(ContentType::Text, &format!("tie {}", i), i, Some(1.0))).collect();
    let first = deduplicate_and_rank(input.clone(), &profile, 4);
    let second = deduplicate_and_rank(input, &profile, 4);
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    let pages: Vec<i32> = first.iter().map(|r| r.fragment.page_number).collect();
    assert_eq!(pages, vec![0, 1, 2, 3], "ties keep discovery order");
    assert!(first.iter().all(|r| r.final_score >= 0.0));
}

#[test]
fn composer_renders_tables_and_text() {
    let profile = analyze_query("uptime");
    let mut table = fragment(ContentType::Table, "Table from page 7 with columns: Metric, Target, Actual.", 7, Some(0.1));
    table.table = TablePayload::new(
        strings(&["Metric", "Target", "Actual"]),
        vec![strings(&["Uptime", "99.9%", "99.95%"]), strings(&["Latency", "", "12ms"])],
    );
    let results = vec![
        score(fragment(ContentType::Text, "Intro text.", 1, Some(0.2)), &profile),
        score(table, &profile),
        score(fragment(ContentType::KeywordText, "Keyword text.", 2, Some(0.5)), &profile),
    ];
    let context = compose_context(&results);

    assert!(context.contains("Metric: Uptime | Target: 99.9% | Actual: 99.95%"));
    assert!(context.contains("• Metric: Latency | Actual: 12ms\n"), "empty cells are skipped");
    assert!(context.starts_with("\n--- TEXT 1 (Page 1) ---\nIntro text."));
    assert!(context.contains("\n--- TABLE 1 (Page 7) ---\n"));
    assert!(context.contains("\n\nStructured Data:\n"));
    assert!(context.contains("\n--- TEXT 2 (Page 2) ---\nKeyword text."));
}

#[test]
fn composer_empty_sentinel() {
    assert_eq!(compose_context(&[]), EMPTY_CONTEXT);
    assert_eq!(EMPTY_CONTEXT, "No relevant information found.");
}
