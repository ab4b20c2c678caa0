//! Chat-completion client used by the retrieval engine's query expander.
//!
//! # Main types
//!
//! - [`LlmBackend`] — Trait implemented by every provider backend.
//! - [`LlmClient`] — Dispatches to a backend chosen from [`ModelConfig`].
//! - [`ChatMessage`] — One message of a chat-completion request.

pub mod backends;
pub mod config;
pub mod llm;

pub use backends::{ChatMessage, LlmBackend, Role};
pub use config::{LlmProvider, ModelConfig};
pub use llm::LlmClient;
