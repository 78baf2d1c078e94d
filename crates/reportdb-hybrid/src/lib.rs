//! Question answering over ingested reports.
//!
//! A question flows through [`analyze`], [`expand`], [`retrieve`], [`rank`]
//! and [`compose`]; [`answer`] turns the composed context into a reply.
//! [`RagEngine`] wires the stages to a store, an embedder and a generator.

#![deny(unused_imports)]

pub mod analyze;
pub mod answer;
pub mod compose;
pub mod expand;
pub mod rank;
pub mod retrieve;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use reportdb_core::config::Settings;
use reportdb_core::error::Error;
use reportdb_core::traits::{Embedder, FragmentStore, Generator};
use reportdb_embed::embedder_from_settings;
use reportdb_llm::OpenAiGenerator;
use reportdb_store::LanceFragmentStore;

pub use analyze::{analyze_query, IntentProfile, QueryPattern};
pub use expand::expand_query;
pub use rank::{deduplicate_and_rank, BoostRule, RankedResult};
pub use retrieve::HybridRetriever;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub embed_timeout: Duration,
    /// Results composed into an answer by [`RagEngine::ask`].
    pub answer_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self { Self { embed_timeout: Duration::from_secs(10), answer_limit: 8 } }
}

impl EngineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            embed_timeout: Duration::from_millis(settings.embedding.timeout_ms),
            answer_limit: settings.retrieval.answer_limit,
        }
    }
}

pub struct RagEngine<S, G> {
    retriever: HybridRetriever<S>,
    generator: G,
    options: EngineOptions,
}

impl<S: FragmentStore, G: Generator> RagEngine<S, G> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>, generator: G, options: EngineOptions) -> Self {
        let retriever = HybridRetriever::new(store, embedder, options.embed_timeout);
        Self { retriever, generator, options }
    }

    pub fn generator(&self) -> &G { &self.generator }

    /// Ranked fragments for `query`, at most `limit`.
    ///
    /// Store failures are logged and yield an empty list.
    pub async fn hybrid_search(&self, query: &str, limit: usize) -> Vec<RankedResult> {
        self.search_with_profile(query, limit).await.1
    }

    async fn search_with_profile(&self, query: &str, limit: usize) -> (IntentProfile, Vec<RankedResult>) {
        let profile = analyze_query(query);
        let fragments = match self.retriever.retrieve(query, limit).await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "search failed");
                return (profile, Vec::new());
            }
        };
        let raw = fragments.len();
        let ranked = deduplicate_and_rank(fragments, &profile, limit);
        info!(raw, ranked = ranked.len(), patterns = ?profile.matched().iter().map(|p| p.name()).collect::<Vec<_>>(), "hybrid search");
        (profile, ranked)
    }

    /// Answers `question` from the store. Only an empty question is an error;
    /// every other failure degrades to an explanatory answer.
    pub async fn ask(&self, question: &str) -> Result<String, Error> {
        if question.trim().is_empty() {
            return Err(Error::EmptyQuestion);
        }
        let (profile, results) = self.search_with_profile(question, self.options.answer_limit).await;
        Ok(answer::generate_answer(&self.generator, question, &results, &profile).await)
    }
}

/// Production wiring: LanceDB store, configured embedder, OpenAI chat generator.
pub async fn connect(settings: &Settings) -> Result<RagEngine<LanceFragmentStore, OpenAiGenerator>> {
    settings.validate()?;
    let store = Arc::new(LanceFragmentStore::open(&settings.store).await?);
    let embedder = embedder_from_settings(&settings.embedding)?;
    let generator = OpenAiGenerator::from_env(&settings.generation)?;
    info!(uri = %settings.store.resolved_uri().display(), "engine ready");
    Ok(RagEngine::new(store, embedder, generator, EngineOptions::from_settings(settings)))
}
