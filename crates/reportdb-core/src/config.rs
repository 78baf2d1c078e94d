//! Lightweight configuration loader and typed settings.
//!
//! Uses Figment to merge `config.toml`, `config.<env>.toml` and `APP_*` env
//! vars into [`Settings`]; every field has a default so an empty source is valid.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> { Self::load_from(Path::new(".")) }

    /// Layers `config.toml`, `config.<env>.toml` (from `RUST_ENV`) found in
    /// `dir`, then `APP_*` variables with `__` as the nesting separator.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        self.figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".to_string()));
        }
        if self.embedding.timeout_ms == 0 {
            return Err(Error::InvalidConfig("embedding.timeout_ms must be positive".to_string()));
        }
        if self.retrieval.search_limit == 0 || self.retrieval.answer_limit == 0 {
            return Err(Error::InvalidConfig("retrieval limits must be positive".to_string()));
        }
        if self.generation.timeout_ms == 0 {
            return Err(Error::InvalidConfig("generation.timeout_ms must be positive".to_string()));
        }
        for (key, name) in [
            ("store.documents_table", &self.store.documents_table),
            ("store.text_table", &self.store.text_table),
            ("store.tables_table", &self.store.tables_table),
        ] {
            if name.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub uri: String,
    pub documents_table: String,
    pub text_table: String,
    pub tables_table: String,
}

impl StoreSettings {
    pub fn resolved_uri(&self) -> PathBuf { expand_path(&self.uri) }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            uri: "~/.reportdb/lancedb".to_string(),
            documents_table: "documents".to_string(),
            text_table: "document_chunks".to_string(),
            tables_table: "extracted_tables".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    OpenAi,
    Local,
    Hashed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimension: usize,
    pub api_base: String,
    /// Per-variant embedding timeout at query time.
    pub timeout_ms: u64,
    /// Directory holding `tokenizer.json`, `config.json` and `pytorch_model.bin`
    /// for the local provider.
    pub model_dir: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            api_base: "https://api.openai.com/v1".to_string(),
            timeout_ms: 10_000,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub search_limit: usize,
    pub answer_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { search_limit: 10, answer_limit: 8 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub api_base: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            max_tokens: 800,
            temperature: 0.1,
            timeout_ms: 60_000,
        }
    }
}

/// Expands `$VAR`/`${VAR}` references, then a leading `~`. No canonicalization.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_env = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_env).into_owned())
}
