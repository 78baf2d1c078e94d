use tracing::warn;

use reportdb_core::error::Error;
use reportdb_core::traits::Generator;

use crate::analyze::IntentProfile;
use crate::compose::compose_context;
use crate::rank::RankedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStyle {
    TableFocused,
    ComparisonFocused,
    General,
}

impl ResponseStyle {
    pub fn for_profile(profile: &IntentProfile) -> Self {
        if profile.table_query {
            ResponseStyle::TableFocused
        } else if profile.comparison_query {
            ResponseStyle::ComparisonFocused
        } else {
            ResponseStyle::General
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            ResponseStyle::TableFocused => "Focus on extracting specific data points, numbers, percentages, and performance metrics. Present the information in a clear, structured way. If comparing values, highlight the differences clearly.",
            ResponseStyle::ComparisonFocused => "Compare the relevant data points clearly. Show changes over time, highlight improvements or declines, and provide context for the changes.",
            ResponseStyle::General => "Provide a comprehensive answer that directly addresses the question. Include specific details and explain their significance.",
        }
    }
}

pub fn build_prompt(question: &str, context: &str, style: ResponseStyle) -> String {
    format!(
        "You are a document analyst. Answer the question directly and concisely.

QUESTION: {question}

RELEVANT INFORMATION:
{context}

FOCUS:
{instruction}

INSTRUCTIONS:
- Give a direct, concise answer (1-3 sentences maximum)
- Include specific numbers/data if relevant
- No extra explanations unless specifically asked
- No formatting like bullet points or headers

ANSWER:",
        instruction = style.instruction(),
    )
}

/// Composes the context and asks the generator. Never fails: an empty result
/// set or a generator error becomes a fixed explanatory answer.
pub async fn generate_answer(generator: &dyn Generator, question: &str, results: &[RankedResult], profile: &IntentProfile) -> String {
    if results.is_empty() {
        return Error::NoResults.user_message();
    }
    let prompt = build_prompt(question, &compose_context(results), ResponseStyle::for_profile(profile));
    match generator.generate(&prompt).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!(error = %e, "answer generation failed");
            Error::GenerationFailed(e.to_string()).user_message()
        }
    }
}
