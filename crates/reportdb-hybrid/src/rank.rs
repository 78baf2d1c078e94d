use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tracing::debug;
use twox_hash::XxHash64;

use reportdb_core::types::{ContentType, Fragment};

use crate::analyze::IntentProfile;

/// Characters of content that, with the page number, identify a fragment.
pub const FINGERPRINT_CHARS: usize = 100;
pub const KEYWORD_BASE_SCORE: f32 = 0.7;

/// Intent-driven score multipliers, tried in [`BoostRule::ORDERED`] order.
/// At most one applies to a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostRule {
    /// Table question, table fragment.
    TableIntent,
    /// Numerical question, fragment text has a digit or `%`.
    NumericIntent,
}

impl BoostRule {
    pub const ORDERED: [BoostRule; 2] = [BoostRule::TableIntent, BoostRule::NumericIntent];

    pub fn factor(self) -> f32 {
        match self {
            BoostRule::TableIntent => 1.5,
            BoostRule::NumericIntent => 1.3,
        }
    }

    pub fn applies(self, profile: &IntentProfile, fragment: &Fragment) -> bool {
        match self {
            BoostRule::TableIntent => profile.table_query && fragment.content_type == ContentType::Table,
            BoostRule::NumericIntent => {
                profile.numerical_query && fragment.text.chars().any(|c| c.is_ascii_digit() || c == '%')
            }
        }
    }

    pub fn first_applicable(profile: &IntentProfile, fragment: &Fragment) -> Option<BoostRule> {
        Self::ORDERED.into_iter().find(|r| r.applies(profile, fragment))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub fragment: Fragment,
    pub base_score: f32,
    pub boost_factor: f32,
    pub final_score: f32,
    pub applied_boost: Option<BoostRule>,
}

/// Content prefix and page number; two fragments with equal keys are duplicates.
pub fn dedup_key(fragment: &Fragment) -> (String, i32) {
    (fragment.text.chars().take(FINGERPRINT_CHARS).collect(), fragment.page_number)
}

/// Short hash of [`dedup_key`], for log lines.
pub fn fingerprint(fragment: &Fragment) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    dedup_key(fragment).hash(&mut hasher);
    hasher.finish()
}

/// `1 / (1 + d)` for vector hits, fixed for keyword hits. Always in `[0, 1]`.
pub fn base_score(fragment: &Fragment) -> f32 {
    if fragment.content_type == ContentType::KeywordText {
        return KEYWORD_BASE_SCORE;
    }
    match fragment.distance {
        Some(d) if d.is_nan() => 0.0,
        Some(d) => 1.0 / (1.0 + d.max(0.0)),
        None => 1.0,
    }
}

pub fn score(fragment: Fragment, profile: &IntentProfile) -> RankedResult {
    let base_score = base_score(&fragment);
    let applied_boost = BoostRule::first_applicable(profile, &fragment);
    let boost_factor = applied_boost.map_or(1.0, BoostRule::factor);
    RankedResult { fragment, base_score, boost_factor, final_score: base_score * boost_factor, applied_boost }
}

/// Drops later duplicates by [`dedup_key`], scores the survivors and returns the
/// best `limit` by final score. Ties keep discovery order.
pub fn deduplicate_and_rank(fragments: Vec<Fragment>, profile: &IntentProfile, limit: usize) -> Vec<RankedResult> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankedResult> = fragments
        .into_iter()
        .filter(|f| {
            let fresh = seen.insert(dedup_key(f));
            if !fresh {
                debug!(fingerprint = %format!("{:016x}", fingerprint(f)), page = f.page_number, "duplicate fragment dropped");
            }
            fresh
        })
        .map(|f| score(f, profile))
        .collect();
    ranked.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    ranked.truncate(limit);
    ranked
}
