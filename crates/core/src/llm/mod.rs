//! # Language Model Binding
//!
//! The seam between agents and the model provider.
//!
//! - [`LanguageModel`] - a bound client that completes one request
//! - [`ModelProvider`] - creates bound clients from a [`ModelConfig`] and an agent's tools
//! - [`cache`] - SQLite response cache keyed by request fingerprint
//! - [`rate_limit`] - optional requests-per-minute throttle
//! - [`radkit_model`] - the production provider backed by radkit

pub mod cache;
pub mod radkit_model;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod scripted;

pub use cache::ResponseCache;
pub use radkit_model::RadkitProvider;
pub use rate_limit::RateLimiter;

use crate::models::ModelConfig;
use crate::tools::radkit_tools::AgentTools;
use crate::tools::ToolKind;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Failures raised by a language model provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    #[error("language model provider error: {0}")]
    Provider(String),

    #[error("language model provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("language model request timed out")]
    Timeout,

    #[error("could not reach language model provider: {0}")]
    Connection(String),

    #[error("failed to bind model '{model}': {reason}")]
    Binding { model: String, reason: String },

    #[error("unexpected language model response: {0}")]
    InvalidResponse(String),
}

impl ModelError {
    /// Best-effort mapping of an opaque provider failure onto a variant
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
            ModelError::RateLimited(message)
        } else if lower.contains("timed out") || lower.contains("timeout") {
            ModelError::Timeout
        } else if lower.contains("connect") || lower.contains("dns") {
            ModelError::Connection(message)
        } else {
            ModelError::Provider(message)
        }
    }
}

/// One fully materialized model call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    /// Role, goal and backstory rendered as system instructions
    pub system: String,
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub tools: Vec<ToolKind>,
}

impl ModelRequest {
    /// SHA-256 over model id, temperature, system instructions and prompt
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.temperature.to_bits().to_le_bytes());
        hasher.update([0u8]);
        hasher.update(self.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.prompt.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A bound language model client. Immutable once created.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;
}

/// Factory for bound clients. `tools` are the agent's capabilities the
/// bound model may call.
pub trait ModelProvider: Send + Sync {
    fn bind(
        &self,
        config: &ModelConfig,
        tools: &AgentTools,
    ) -> Result<Arc<dyn LanguageModel>, ModelError>;
}
