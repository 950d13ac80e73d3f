//! # radkit Provider
//!
//! Production [`ModelProvider`]. Binding validates the config and creates a
//! provider client once, which fails fast when the API key is missing.
//! Each completion runs an `LlmFunction` when the agent has no usable
//! tools, otherwise an `LlmWorker` carrying the agent's function tools.

use super::{LanguageModel, ModelError, ModelProvider, ModelRequest};
use crate::models::{LlmProvider, ModelConfig};
use crate::tools::radkit_tools::AgentTools;
use async_trait::async_trait;
use radkit::agent::{LlmFunction, LlmWorker};
use radkit::macros::LLMOutput;
use radkit::models::providers::{
    AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Free-text stage answer
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct StageText {
    /// The complete answer to the task, in Markdown
    pub content: String,
}

/// Create the provider client for `$config` as `$llm`, then evaluate `$body`.
macro_rules! with_provider_llm {
    ($config:expr, $llm:ident => $body:expr) => {{
        let config = $config;
        match config.provider {
            LlmProvider::Anthropic => {
                let $llm = AnthropicLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::OpenAI => {
                let mut $llm = OpenAILlm::from_env(&config.model)?;
                if let Some(base_url) = &config.base_url {
                    $llm = $llm.with_base_url(base_url);
                }
                $body
            }
            LlmProvider::Gemini => {
                let $llm = GeminiLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::OpenRouter => {
                let $llm = OpenRouterLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::Grok => {
                let $llm = GrokLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::DeepSeek => {
                let $llm = DeepSeekLlm::from_env(&config.model)?;
                $body
            }
        }
    }};
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RadkitProvider;

impl RadkitProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ModelProvider for RadkitProvider {
    fn bind(
        &self,
        config: &ModelConfig,
        tools: &AgentTools,
    ) -> Result<Arc<dyn LanguageModel>, ModelError> {
        let binding_error = |e: anyhow::Error| ModelError::Binding {
            model: config.model.clone(),
            reason: format!("{:#}", e),
        };
        config.validate().map_err(binding_error)?;
        config.create_llm().map_err(binding_error)?;

        tracing::debug!(
            provider = %config.provider,
            model = %config.model,
            tools = ?tools.available(),
            "Bound language model"
        );
        Ok(Arc::new(RadkitModel {
            config: config.clone(),
            tools: tools.clone(),
        }))
    }
}

pub struct RadkitModel {
    config: ModelConfig,
    tools: AgentTools,
}

impl RadkitModel {
    async fn run(&self, request: &ModelRequest) -> anyhow::Result<StageText> {
        let config = &self.config;
        let system = request.system.clone();
        let input = request.prompt.clone();
        let tools = self.tools.function_tools();

        if tools.is_empty() {
            return with_provider_llm!(config, llm => {
                LlmFunction::<StageText>::new_with_system_instructions(llm, system)
                    .run(input)
                    .await
                    .map_err(anyhow::Error::from)
            });
        }

        with_provider_llm!(config, llm => {
            LlmWorker::<StageText>::builder(llm)
                .with_system_instructions(system)
                .with_tools(tools)
                .build()
                .run(input)
                .await
                .map_err(anyhow::Error::from)
        })
    }
}

#[async_trait]
impl LanguageModel for RadkitModel {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let output = self
            .run(request)
            .await
            .map_err(|e| ModelError::from_provider_message(format!("{:#}", e)))?;

        if output.content.trim().is_empty() {
            return Err(ModelError::InvalidResponse(
                "model returned an empty answer".to_string(),
            ));
        }
        Ok(output.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::errors::ErrorStore;
    use crate::tools::{ToolBox, ToolKind};

    #[test]
    fn test_bind_rejects_invalid_config() {
        let config = ModelConfig::default().with_temperature(3.0);
        let tools = AgentTools::new(
            AgentKind::Analyst,
            &[ToolKind::WebSearch],
            ToolBox::new(),
            ErrorStore::new(),
            "Java",
        );
        let err = RadkitProvider::new()
            .bind(&config, &tools)
            .err()
            .unwrap();
        match err {
            ModelError::Binding { model, reason } => {
                assert_eq!(model, config.model);
                assert!(reason.contains("invalid temperature"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
