use arxrag_llm::LlmBackend;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Trait for expanding one query into several search variants to improve recall.
///
/// Implementations never fail: on any problem they return the original query
/// as the only variant.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Produce up to `count` non-empty variants of `query`. Never empty.
    async fn expand(&self, query: &str, count: usize) -> Vec<String>;
}

/// Asks a language model for `count` search-term variants returned as a
/// strict JSON array of strings.
pub struct LlmQueryExpander {
    llm: Arc<dyn LlmBackend>,
}

impl LlmQueryExpander {
    pub fn new(llm: Arc<dyn LlmBackend>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QueryExpander for LlmQueryExpander {
    async fn expand(&self, query: &str, count: usize) -> Vec<String> {
        let prompt = expansion_prompt(query, count.max(1));

        let text = match self.llm.complete(Some(&prompt), &[]).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Query expansion call failed, using original query");
                return vec![query.to_string()];
            }
        };

        match parse_variants(&text) {
            Some(variants) => {
                debug!(requested = count, produced = variants.len(), "Expanded query");
                variants
            }
            None => {
                warn!(response = %text, "Query expansion returned malformed output, using original query");
                vec![query.to_string()]
            }
        }
    }
}

/// System instruction sent to the model.
pub fn expansion_prompt(question: &str, count: usize) -> String {
    format!(
        "You are an AI language model assistant. Your task is to generate {count} \
different search terms based on the given user question to retrieve relevant documents \
from a vector database. By generating multiple keyword variations, your goal is to help \
the user overcome some of the limitations of distance-based similarity search.\n\n\
Original question: {question}\n\n\
Return the output strictly as a JSON array of {count} strings, and nothing else.\n\n\
Output format:\n[\n    \"search term 1\",\n    \"search term 2\",\n    ...\n]\n\n\
Do not include numbering, markdown, explanations, or any extra text."
    )
}

/// Parses a JSON array of strings, tolerating one surrounding Markdown code
/// fence. Blank entries are dropped; `None` when nothing usable remains.
pub fn parse_variants(text: &str) -> Option<Vec<String>> {
    let payload = strip_code_fence(text.trim());
    let parsed: Vec<String> = serde_json::from_str(payload).ok()?;

    let variants: Vec<String> = parsed
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    if variants.is_empty() {
        None
    } else {
        Some(variants)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
