use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use reportdb_core::error::Error;
use reportdb_core::traits::{Embedder, FragmentStore};
use reportdb_core::types::{Collection, ContentType, Fragment, StoredFragment, TablePayload};

use crate::expand::expand_query;

/// Keywords must be longer than this many characters.
pub const MIN_KEYWORD_CHARS: usize = 3;
pub const KEYWORD_HIT_LIMIT: usize = 5;
/// Recorded on keyword hits for traceability; ranking ignores it.
pub const KEYWORD_DISTANCE: f32 = 0.5;

/// Semantic search over every query variant plus substring search over the
/// original query's keywords, merged into one unranked list.
pub struct HybridRetriever<S> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
}

impl<S: FragmentStore> HybridRetriever<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>, embed_timeout: Duration) -> Self {
        Self { store, embedder, embed_timeout }
    }

    /// Raw hits for `query`, duplicates included.
    ///
    /// Order is text hits then table hits (each in variant order) then keyword
    /// hits. A variant whose embedding is unavailable only drops out of the
    /// semantic half; any store failure fails the whole call.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Fragment>, Error> {
        let variants = expand_query(query);
        let embedded = self.embed_variants(&variants).await;
        let keywords = keywords(query);
        debug!(variants = variants.len(), embedded = embedded.len(), keywords = keywords.len(), "retrieving");

        let text = try_join_all(embedded.iter().map(|v| self.nearest(Collection::Text, v, limit)));
        let tables = try_join_all(embedded.iter().map(|v| self.nearest(Collection::Tables, v, limit)));
        let matches = try_join_all(keywords.iter().map(|k| self.substring(k)));
        let (text, tables, matches) = tokio::try_join!(text, tables, matches)?;

        let mut fragments = Vec::new();
        fragments.extend(text.into_iter().flatten().map(|row| tag(row, ContentType::Text)));
        fragments.extend(tables.into_iter().flatten().map(table_fragment));
        fragments.extend(matches.into_iter().flatten().map(|row| {
            let mut f = tag(row, ContentType::KeywordText);
            f.distance = Some(KEYWORD_DISTANCE);
            f
        }));
        debug!(hits = fragments.len(), "retrieved");
        Ok(fragments)
    }

    /// Embeddings for the variants that produced one, in variant order.
    pub async fn embed_variants(&self, variants: &[String]) -> Vec<Vec<f32>> {
        let results = join_all(variants.iter().map(|v| self.embed_variant(v))).await;
        results
            .into_iter()
            .filter_map(|r| match r {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "skipping variant for semantic search");
                    None
                }
            })
            .collect()
    }

    async fn embed_variant(&self, variant: &str) -> Result<Vec<f32>, Error> {
        let unavailable = |reason: String| Error::EmbeddingUnavailable { variant: variant.to_string(), reason };
        match tokio::time::timeout(self.embed_timeout, self.embedder.embed(variant)).await {
            Err(_) => Err(unavailable(format!("timed out after {}ms", self.embed_timeout.as_millis()))),
            Ok(Err(e)) => Err(unavailable(e.to_string())),
            Ok(Ok(None)) => Err(unavailable("no vector returned".to_string())),
            Ok(Ok(Some(v))) if v.is_empty() => Err(unavailable("empty vector".to_string())),
            Ok(Ok(Some(v))) => Ok(v),
        }
    }

    async fn nearest(&self, collection: Collection, vector: &[f32], limit: usize) -> Result<Vec<StoredFragment>, Error> {
        self.store
            .nearest(collection, vector, limit)
            .await
            .map_err(|e| Error::StoreQueryFailed { collection, reason: e.to_string() })
    }

    async fn substring(&self, keyword: &str) -> Result<Vec<StoredFragment>, Error> {
        self.store
            .substring_match(Collection::Text, keyword, KEYWORD_HIT_LIMIT)
            .await
            .map_err(|e| Error::StoreQueryFailed { collection: Collection::Text, reason: e.to_string() })
    }
}

/// Whitespace tokens of the lower-cased query longer than [`MIN_KEYWORD_CHARS`].
pub fn keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_KEYWORD_CHARS)
        .map(str::to_string)
        .collect()
}

fn tag(row: StoredFragment, content_type: ContentType) -> Fragment {
    Fragment {
        content_type,
        text: row.content,
        page_number: row.page_number,
        document_id: row.document_id,
        distance: row.distance,
        table: TablePayload::Absent,
    }
}

fn table_fragment(mut row: StoredFragment) -> Fragment {
    let payload = match row.table_json.take() {
        None => TablePayload::Absent,
        Some(raw) => TablePayload::from_json(&raw).unwrap_or_else(|e| {
            warn!(page = row.page_number, doc = row.document_id, error = %e, "unreadable table payload");
            TablePayload::Absent
        }),
    };
    let mut fragment = tag(row, ContentType::Table);
    fragment.table = payload;
    fragment
}
