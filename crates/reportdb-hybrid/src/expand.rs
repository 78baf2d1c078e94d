//! Synonym-based query variants.

pub const MAX_VARIANTS: usize = 5;

const SYNONYMS: &[(&str, &[&str])] = &[
    ("performance", &["result", "outcome", "achievement", "metric"]),
    ("target", &["goal", "objective", "aim"]),
    ("actual", &["result", "achieved", "real"]),
    ("measure", &["metric", "indicator", "kpi"]),
    ("service", &["assistance", "support", "help"]),
    ("accuracy", &["correctness", "precision"]),
    ("customer", &["taxpayer", "caller", "client"]),
];

/// The query itself followed by synonym rewrites of its lower-cased form.
///
/// Replacement is plain substring replacement, so `customer` also rewrites
/// inside `customers`. Duplicates keep their first position and the result
/// never exceeds [`MAX_VARIANTS`].
pub fn expand_query(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    let mut variants = vec![query.to_string()];
    for (word, synonyms) in SYNONYMS {
        if lowered.contains(word) {
            variants.extend(synonyms.iter().map(|s| lowered.replace(word, s)));
        }
    }

    let mut unique: Vec<String> = Vec::with_capacity(MAX_VARIANTS);
    for v in variants {
        if unique.len() == MAX_VARIANTS { break; }
        if !unique.contains(&v) { unique.push(v); }
    }
    unique
}
