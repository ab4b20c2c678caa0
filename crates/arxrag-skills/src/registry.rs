use crate::skill::{Skill, SkillDescriptor};
use arxrag_core::{RagError, RagResult, ToolCall, ToolResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Central registry for all available skills.
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: HashMap::new(),
        }
    }

    /// Registers a skill under its descriptor name, replacing any previous
    /// skill with the same name.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.descriptor().name.clone();
        info!(skill = %name, "Registered skill");
        self.skills.insert(name, skill);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    /// Descriptors sorted by name.
    pub fn list_descriptors(&self) -> Vec<&SkillDescriptor> {
        let mut descriptors: Vec<&SkillDescriptor> =
            self.skills.values().map(|s| s.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub async fn execute(&self, call: ToolCall) -> RagResult<ToolResult> {
        let skill = self
            .skills
            .get(&call.name)
            .ok_or_else(|| RagError::Skill(format!("Unknown skill: {}", call.name)))?;

        skill.execute(call).await
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}
