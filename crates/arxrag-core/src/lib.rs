//! Core types and error definitions for the arxrag retrieval engine.
//!
//! This crate provides the foundational types shared across all arxrag crates,
//! including error handling, the canonical document model, and tool call
//! abstractions used by the agent-facing tool interface.
//!
//! # Main types
//!
//! - [`RagError`] — Unified error enum for all arxrag subsystems.
//! - [`RagResult`] — Convenience alias for `Result<T, RagError>`.
//! - [`Document`] — Immutable document value produced by the vector store.
//! - [`SearchResult`] — A raw row returned by a nearest-neighbor query.
//! - [`ToolCall`] — Represents an LLM-initiated tool invocation request.
//! - [`ToolResult`] — The result returned after executing a tool call.

/// Document value types and order-stable deduplication.
pub mod document;

pub use document::{dedupe, Document, DocumentIdentity, SearchResult, IDENTITY_BODY_CHARS};

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the arxrag crates.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// An error from an outbound HTTP request (e.g. the embedding service).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error returned by a language-model backend.
    #[error("LLM error: {0}")]
    Llm(String),

    /// A database error that survived the retry policy.
    #[error("Database error: {0}")]
    Database(String),

    /// A resource was used before initialization or after it was closed.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error raised by a skill during invocation.
    #[error("Skill error: {0}")]
    Skill(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`RagError`].
pub type RagResult<T> = Result<T, RagError>;

// --- Tool types ---

/// A request from the LLM to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier assigned by the LLM for this tool call.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments to pass to the tool.
    pub arguments: serde_json::Value,
}

/// The result returned after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The ID of the [`ToolCall`] this result corresponds to.
    pub call_id: String,
    /// The textual output produced by the tool.
    pub content: String,
    /// Whether the tool execution ended in an error.
    pub is_error: bool,
}

impl ToolResult {
    /// Creates a successful tool result.
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Creates an error tool result.
    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
