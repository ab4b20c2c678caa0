use crate::skill::{Skill, SkillDescriptor};
use arxrag_core::{RagResult, ToolCall, ToolResult};
use arxrag_retrieval::RetrievalEngine;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Name under which the retriever is exposed to the agent.
pub const DOCUMENT_RETRIEVER: &str = "document_retriever";

/// Skill that retrieves arXiv documents relevant to a user query.
pub struct DocumentRetrieverSkill {
    descriptor: SkillDescriptor,
    engine: Arc<RetrievalEngine>,
}

impl DocumentRetrieverSkill {
    pub fn new(engine: Arc<RetrievalEngine>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: DOCUMENT_RETRIEVER.to_string(),
                description:
                    "This tool retrieves the documents relevant to the user query from the database"
                        .to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "The user query to search documents for"
                        }
                    },
                    "required": ["query"]
                }),
            },
            engine,
        }
    }
}

#[async_trait]
impl Skill for DocumentRetrieverSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> RagResult<ToolResult> {
        let query = call.arguments["query"].as_str().unwrap_or_default().trim();

        if query.is_empty() {
            return Ok(ToolResult::error(&call.id, "Error: query cannot be empty"));
        }

        let documents = self.engine.retrieve(query).await;
        debug!(query, total = documents.len(), "document_retriever finished");

        let response = serde_json::json!({
            "query": query,
            "total": documents.len(),
            "documents": documents,
        });
        Ok(ToolResult::success(&call.id, response.to_string()))
    }
}
