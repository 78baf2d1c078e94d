//! Multi-label intent classification of a question.

use regex::Regex;
use std::sync::LazyLock;

const TABLE_TERMS: &[&str] = &[
    "table", "performance", "measure", "indicator", "result", "target", "actual", "percentage", "%", "score", "rate",
    "level", "coverage",
];
const COMPARISON_TERMS: &[&str] =
    &["compare", "vs", "versus", "difference", "change", "increase", "decrease", "better", "worse", "higher", "lower"];
const TEMPORAL_TERMS: &[&str] = &["2020", "2021", "2022", "2023", "2024", "year", "fy", "fiscal"];
const METRIC_TERMS: &[&str] =
    &["service", "accuracy", "timeliness", "satisfaction", "inventory", "collection", "compliance", "resolution"];
const NUMERIC_WORDS: &[&str] = &["number", "count", "amount", "total", "sum"];

static NUMERIC_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+|number|count|amount|total|sum").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryPattern {
    TableQuery,
    NumericalQuery,
    ComparisonQuery,
    TemporalQuery,
    SpecificMetric,
}

impl QueryPattern {
    pub const ALL: [QueryPattern; 5] = [
        QueryPattern::TableQuery,
        QueryPattern::NumericalQuery,
        QueryPattern::ComparisonQuery,
        QueryPattern::TemporalQuery,
        QueryPattern::SpecificMetric,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueryPattern::TableQuery => "table_query",
            QueryPattern::NumericalQuery => "numerical_query",
            QueryPattern::ComparisonQuery => "comparison_query",
            QueryPattern::TemporalQuery => "temporal_query",
            QueryPattern::SpecificMetric => "specific_metric",
        }
    }

    /// `normalized` must already be lower-cased and trimmed.
    fn matches(self, normalized: &str) -> bool {
        let any = |terms: &[&str]| terms.iter().any(|t| normalized.contains(t));
        match self {
            QueryPattern::TableQuery => any(TABLE_TERMS),
            QueryPattern::NumericalQuery => match NUMERIC_RE.as_ref() {
                Some(re) => re.is_match(normalized),
                None => normalized.chars().any(|c| c.is_ascii_digit()) || any(NUMERIC_WORDS),
            },
            QueryPattern::ComparisonQuery => any(COMPARISON_TERMS),
            QueryPattern::TemporalQuery => any(TEMPORAL_TERMS),
            QueryPattern::SpecificMetric => any(METRIC_TERMS),
        }
    }
}

/// Which of the five patterns a question matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentProfile {
    /// The lower-cased, trimmed question the patterns ran against.
    pub normalized: String,
    pub table_query: bool,
    pub numerical_query: bool,
    pub comparison_query: bool,
    pub temporal_query: bool,
    pub specific_metric: bool,
    /// Two or more patterns matched.
    pub is_complex: bool,
}

impl IntentProfile {
    pub fn get(&self, pattern: QueryPattern) -> bool {
        match pattern {
            QueryPattern::TableQuery => self.table_query,
            QueryPattern::NumericalQuery => self.numerical_query,
            QueryPattern::ComparisonQuery => self.comparison_query,
            QueryPattern::TemporalQuery => self.temporal_query,
            QueryPattern::SpecificMetric => self.specific_metric,
        }
    }

    pub fn matched(&self) -> Vec<QueryPattern> {
        QueryPattern::ALL.into_iter().filter(|p| self.get(*p)).collect()
    }
}

pub fn analyze_query(query: &str) -> IntentProfile {
    let normalized = query.trim().to_lowercase();
    let [table, numerical, comparison, temporal, metric] = QueryPattern::ALL.map(|p| p.matches(&normalized));
    let matched = [table, numerical, comparison, temporal, metric].iter().filter(|m| **m).count();
    IntentProfile {
        normalized,
        table_query: table,
        numerical_query: numerical,
        comparison_query: comparison,
        temporal_query: temporal,
        specific_metric: metric,
        is_complex: matched >= 2,
    }
}
