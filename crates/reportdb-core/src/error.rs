use thiserror::Error;

use crate::types::Collection;

/// Answer returned when retrieval produced nothing.
pub const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in the documents to answer your question. Please try rephrasing your query or asking about different topics.";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Embedding unavailable for variant '{variant}': {reason}")]
    EmbeddingUnavailable { variant: String, reason: String },

    #[error("Store query on {collection} failed: {reason}")]
    StoreQueryFailed { collection: Collection, reason: String },

    #[error("Malformed table payload: {0}")]
    MalformedStructuredPayload(String),

    #[error("Answer generation failed: {0}")]
    GenerationFailed(String),

    #[error("No relevant fragments found")]
    NoResults,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// The text shown to the end user when this error degrades an answer.
    pub fn user_message(&self) -> String {
        match self {
            Error::NoResults => NO_RESULTS_ANSWER.to_string(),
            Error::GenerationFailed(reason) => {
                format!("I found relevant information but encountered an error generating the response: {}", reason)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
