//! Agent-facing tool interface for arxrag.
//!
//! Exposes retrieval to a conversational agent through the [`Skill`] trait.
//! Skills are looked up by name in a [`SkillRegistry`] and invoked with a
//! [`ToolCall`](arxrag_core::ToolCall) produced by the language model.

/// The `document_retriever` skill.
pub mod document_retriever;
/// Name-indexed skill registry.
pub mod registry;
/// Skill trait and descriptor.
pub mod skill;

pub use document_retriever::{DocumentRetrieverSkill, DOCUMENT_RETRIEVER};
pub use registry::SkillRegistry;
pub use skill::{Skill, SkillDescriptor};
