use arxrag_core::{RagResult, ToolCall, ToolResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata a language model needs to decide when and how to call a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the `arguments` object.
    pub parameters_schema: serde_json::Value,
}

/// A tool the conversational agent can invoke.
///
/// Problems the agent can recover from (bad arguments, empty results) are
/// reported as [`ToolResult::error`], not as `Err`.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> &SkillDescriptor;

    async fn execute(&self, call: ToolCall) -> RagResult<ToolResult>;
}
